mod support;

use nexus_core::package::{
    BuildIdAware, ComposerPackage, Package, Parameter, ZpkPackage, export_package,
};

use support::{composer_json, zpk_descriptor};

// ============================================================================
// Composer packages
// ============================================================================

#[test]
fn composer_package_reads_deployment_section() {
    let package = ComposerPackage::from_json_str(&composer_json("Acme/Shop", "2.1.0")).unwrap();

    assert_eq!(package.name(), "acme/shop");
    assert_eq!(package.id(), "acme/shop@2.1.0");
    assert_eq!(package.package_type(), "composer");
    assert_eq!(package.document_root(), "public");
    assert!(package.is_stable());

    assert_eq!(package.variables().get("APP_ENV").map(String::as_str), Some("prod"));
    assert_eq!(package.variables().get("WORKERS").map(String::as_str), Some("4"));

    assert!(package.extra_value("deployment").is_none());
    assert!(package.extra_value("branch-alias").is_some());
}

#[test]
fn composer_parameters_from_string_and_object() {
    let package = ComposerPackage::from_json_str(&composer_json("acme/shop", "2.1.0")).unwrap();

    let password = package.parameter("db_password").unwrap();
    assert_eq!(password.parameter_type(), "password");
    assert_eq!(password.label(), "db_password");
    assert!(!password.is_required());
    assert!(!password.has_value_options());

    let mode = package.parameter("mode").unwrap();
    assert_eq!(mode.parameter_type(), "select");
    assert_eq!(mode.label(), "Mode");
    assert_eq!(mode.default_value(), Some("fast"));
    assert!(mode.is_required());
    assert!(mode.accepts_value("safe"));
    assert!(!mode.accepts_value("turbo"));
}

#[test]
fn composer_dependencies_come_from_platform_requirements() {
    let package = ComposerPackage::from_json_str(&composer_json("acme/shop", "2.1.0")).unwrap();

    let names: Vec<&str> = package.dependencies().iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["ext-intl", "php"]);

    let php = &package.dependencies()[1];
    assert!(php.is_satisfied_by("8.2.10").unwrap());
    assert!(!php.is_satisfied_by("7.3.0").unwrap());
}

#[test]
fn composer_without_version_is_rejected() {
    let err = ComposerPackage::from_json_str(r#"{"name": "acme/shop", "extra": {"deployment": {}}}"#)
        .unwrap_err();
    assert!(err.is_unexpected_value());
}

#[test]
fn prerelease_versions_are_unstable() {
    for version in ["2.0.0-beta1", "2.0.0-RC2", "dev-master", "1.0.0-alpha.3"] {
        let package = ComposerPackage::from_json_str(&composer_json("acme/shop", version)).unwrap();
        assert!(!package.is_stable(), "{version} should be unstable");
    }
}

#[test]
fn empty_deployment_array_is_an_empty_section() {
    let package = ComposerPackage::from_json_str(
        r#"{"name": "acme/shop", "version": "1.0.0", "extra": {"deployment": []}}"#,
    )
    .unwrap();

    assert_eq!(package.document_root(), "");
    assert!(package.parameters().is_empty());
    assert!(package.variables().is_empty());

    let err = ComposerPackage::from_json_str(
        r#"{"name": "acme/shop", "version": "1.0.0", "extra": {"deployment": ["public"]}}"#,
    )
    .unwrap_err();
    assert!(err.is_unexpected_value());
}

// ============================================================================
// Build ids
// ============================================================================

#[test]
fn build_id_is_appended_to_version() {
    let mut package = ComposerPackage::from_json_str(&composer_json("acme/shop", "2.1.0")).unwrap();

    package.set_build_id("ci.1234").unwrap();
    assert_eq!(package.version(), "2.1.0+ci.1234");
    assert_eq!(package.id(), "acme/shop@2.1.0+ci.1234");
    assert_eq!(package.build_id(), Some("ci.1234"));

    package.set_build_id("").unwrap();
    assert_eq!(package.id(), "acme/shop@2.1.0");
    assert_eq!(package.build_id(), None);
}

#[test]
fn build_id_does_not_affect_stability() {
    let mut composer = ComposerPackage::from_json_str(&composer_json("acme/shop", "2.1.0")).unwrap();
    let mut zpk = ZpkPackage::from_xml(&zpk_descriptor("demo", "1.0.0")).unwrap();

    for build_id in ["b.7", "a", "rc1"] {
        composer.set_build_id(build_id).unwrap();
        zpk.set_build_id(build_id).unwrap();
        assert!(composer.is_stable(), "build id {build_id:?} made composer unstable");
        assert!(zpk.is_stable(), "build id {build_id:?} made zpk unstable");
    }

    let mut beta = ComposerPackage::from_json_str(&composer_json("acme/shop", "2.1.0-beta1")).unwrap();
    beta.set_build_id("7").unwrap();
    assert!(!beta.is_stable());
}

#[test]
fn malformed_build_id_is_rejected() {
    let mut package = ZpkPackage::from_xml(&zpk_descriptor("demo", "1.0.0")).unwrap();

    for bad in ["ci..1", ".ci", "ci-1", "ci 1", "\u{212A}1", "ci.\u{017F}"] {
        let err = package.set_build_id(bad).unwrap_err();
        assert!(err.is_invalid_argument(), "{bad:?} should be rejected");
    }
    assert_eq!(package.version(), "1.0.0");
}

// ============================================================================
// ZPK packages
// ============================================================================

#[test]
fn zpk_package_reads_descriptor() {
    let package = ZpkPackage::from_xml(&zpk_descriptor("Demo App", "1.4.2")).unwrap();

    assert_eq!(package.name(), "demo-app");
    assert_eq!(package.id(), "demo-app@1.4.2");
    assert_eq!(package.package_type(), "zpk");
    assert_eq!(package.document_root(), "data/public");
    assert_eq!(package.app_dir(), "data");
    assert_eq!(package.scripts_dir(), "scripts");
    assert_eq!(package.extra_value("app-dir").and_then(|v| v.as_str()), Some("data"));

    assert_eq!(
        package.variables().get("APP_ENV").map(String::as_str),
        Some("production")
    );
    assert_eq!(package.variables().get("DEBUG").map(String::as_str), Some("0"));
}

#[test]
fn zpk_choice_becomes_select() {
    let package = ZpkPackage::from_xml(&zpk_descriptor("demo", "1.0.0")).unwrap();

    let host = package.parameter("db_host").unwrap();
    assert_eq!(host.parameter_type(), "hostname");
    assert_eq!(host.label(), "Database host");
    assert_eq!(host.default_value(), Some("localhost"));
    assert!(host.is_required());

    let cache = package.parameter("cache").unwrap();
    assert_eq!(cache.parameter_type(), "select");
    assert_eq!(cache.default_value(), Some("redis"));
    assert_eq!(cache.options().get("readonly"), Some(&serde_json::Value::Bool(true)));

    let allowed: Vec<&String> = cache.value_options().unwrap().keys().collect();
    assert_eq!(allowed, vec!["memcached", "redis"]);
}

#[test]
fn zpk_dependencies() {
    let package = ZpkPackage::from_xml(&zpk_descriptor("demo", "1.0.0")).unwrap();

    let php = package.dependencies().iter().find(|d| d.name() == "php").unwrap();
    assert_eq!(php.constraint_str(), ">=7.1 <=8.3.99");
    assert!(php.is_satisfied_by("8.1.0").unwrap());
    assert!(!php.is_satisfied_by("8.4.0").unwrap());

    let pdo = package.dependencies().iter().find(|d| d.name() == "ext-pdo").unwrap();
    assert_eq!(pdo.constraint_str(), "*");
}

#[test]
fn zpk_schema_violation_is_runtime_error() {
    let xml = zpk_descriptor("demo", "1.0.0").replace("<appdir>data</appdir>", "");
    let err = ZpkPackage::from_xml(&xml).unwrap_err();
    assert!(err.is_runtime());

    let xml = zpk_descriptor("demo", "1.0.0").replace("<type>application</type>", "<type>theme</type>");
    assert!(ZpkPackage::from_xml(&xml).unwrap_err().is_runtime());
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn export_is_deterministic() {
    let document = composer_json("acme/shop", "2.1.0");
    let first = export_package(&ComposerPackage::from_json_str(&document).unwrap());
    let second = export_package(&ComposerPackage::from_json_str(&document).unwrap());

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn export_carries_id_and_parameters() {
    let mut package = ZpkPackage::from_xml(&zpk_descriptor("demo", "1.0.0")).unwrap();
    package.set_build_id("7").unwrap();

    let json = export_package(&package).to_value();

    assert_eq!(json["id"], "demo@1.0.0+7");
    assert_eq!(json["version"], "1.0.0+7");
    assert_eq!(json["type"], "zpk");
    assert_eq!(json["documentRoot"], "data/public");
    assert_eq!(json["parameters"]["cache"]["type"], "select");
    assert_eq!(json["parameters"]["cache"]["valueOptions"]["redis"], "redis");
    assert!(json["parameters"]["db_host"].get("valueOptions").is_none());
}
