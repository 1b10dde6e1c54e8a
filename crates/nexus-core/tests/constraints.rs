use nexus_core::package::{
    CombinationType, Constraint, ConstraintBuilder, ConstraintCombination, PlatformDependency,
};

fn matches(constraint: &str, version: &str) -> bool {
    ConstraintBuilder::new()
        .create_constraint(constraint)
        .unwrap()
        .matches(version)
}

// ============================================================================
// Combinations
// ============================================================================

#[test]
fn empty_combinations_never_match() {
    for combination_type in [CombinationType::And, CombinationType::Or] {
        let combination = ConstraintCombination::new(combination_type);
        assert!(!combination.matches("1.0.0"));
        assert!(!Constraint::Combination(combination).matches("0.0.1"));
    }
}

#[test]
fn combination_semantics() {
    let builder = ConstraintBuilder::new();
    let at_least_7 = builder.create_constraint(">=7.0").unwrap();
    let below_8 = builder.create_constraint("<8.0").unwrap();

    let and = ConstraintCombination::with_constraints(
        CombinationType::And,
        [at_least_7.clone(), below_8.clone()],
    );
    assert!(and.matches("7.4.3"));
    assert!(!and.matches("8.1.0"));

    let mut or = ConstraintCombination::new(CombinationType::Or);
    or.add(below_8);
    or.add(builder.create_constraint(">=9.0").unwrap());
    assert!(or.matches("7.4.0"));
    assert!(or.matches("9.1.0"));
    assert!(!or.matches("8.2.0"));
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn operators_and_spacing() {
    assert!(matches(">= 7.4", "7.4.0"));
    assert!(matches(">=7.4, <8", "7.4.33"));
    assert!(!matches(">=7.4, <8", "8.0.0"));
    assert!(matches(">=7.4 <8", "7.4.1"));
    assert!(matches("!=7.4.1", "7.4.2"));
    assert!(!matches("!=7.4.1", "7.4.1"));
    assert!(matches("7.4.1", "v7.4.1"));
}

#[test]
fn alternatives() {
    assert!(matches("^7.4 || ^8.1", "8.2.0"));
    assert!(matches("^7.4||^8.1", "7.4.9"));
    assert!(!matches("^7.4 || ^8.1", "8.0.5"));
}

#[test]
fn tilde_and_wildcards() {
    assert!(matches("~1.2", "1.2.9"));
    assert!(!matches("~1.2", "1.3.0"));
    assert!(matches("~1", "1.9.0"));
    assert!(matches("1.2.*", "1.2.5"));
    assert!(!matches("1.2.*", "1.3.0"));
    assert!(matches("*", "5.6.40"));
    assert!(matches("", "5.6.40"));
}

#[test]
fn ranges_at_the_numeric_limit_are_open_ended() {
    assert!(matches("~1.18446744073709551615", "1.18446744073709551615.3"));
    assert!(!matches("~1.18446744073709551615", "1.18446744073709551614.0"));
    assert!(matches("^0.18446744073709551615", "0.18446744073709551615.9"));
    assert!(matches("^18446744073709551615", "18446744073709551615.2.0"));
    assert!(matches("~18446744073709551615", "18446744073709551615.0.1"));
}

#[test]
fn unparseable_versions_never_match() {
    assert!(!matches("*", "not-a-version"));
    assert!(!matches(">=1.0", ""));
}

#[test]
fn invalid_constraints_are_rejected() {
    let builder = ConstraintBuilder::new();
    for input in [">=banana", "1.0 ||", "~"] {
        let err = builder.create_constraint(input).unwrap_err();
        assert!(err.is_unexpected_value(), "{input:?} should be rejected");
    }
}

#[test]
fn platform_dependency_delegates_to_constraint() {
    let dependency = PlatformDependency::new("php", ">=7.1 <=8.3.99");
    assert_eq!(dependency.dependency_type(), "platform");
    assert!(dependency.is_satisfied_by("8.3.4").unwrap());
    assert!(!dependency.is_satisfied_by("7.0.33").unwrap());

    assert!(PlatformDependency::any("ext-intl").is_satisfied_by("1.0").unwrap());
}
