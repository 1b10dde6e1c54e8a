mod support;

use nexus_core::application::{Application, SharedApplication};
use nexus_core::instance::{ApplicationInstance, ApplicationState, UserParameters};
use nexus_core::package::{BuildIdAware, ComposerPackage, Package};
use nexus_core::vhost::VHost;

use support::composer_json;

// ============================================================================
// Test Helpers
// ============================================================================

fn package(name: &str, version: &str) -> ComposerPackage {
    ComposerPackage::from_json_str(&composer_json(name, version)).unwrap()
}

fn application_with(versions: &[&str]) -> (SharedApplication, Vec<ComposerPackage>) {
    let mut application = Application::new("acme/shop");
    let packages: Vec<ComposerPackage> = versions
        .iter()
        .map(|v| package("acme/shop", v))
        .collect();

    for package in &packages {
        application.add_package(package).unwrap();
    }

    (application.into_shared(), packages)
}

fn params(pairs: &[(&str, &str)]) -> UserParameters {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn instance_ids_must_be_slugs() {
    let (application, _) = application_with(&[]);

    assert!(ApplicationInstance::new(application.clone(), "shop_eu-1", None, None).is_ok());

    for bad in ["", "shop eu", "shop/eu", "shöp", "\u{017F}hop", "\u{212A}iosk"] {
        let err = ApplicationInstance::new(application.clone(), bad, None, None).unwrap_err();
        assert!(err.is_invalid_argument(), "{bad:?} should be rejected");
    }
}

#[test]
fn paths_are_normalized() {
    let (application, _) = application_with(&[]);
    let mount = |path: Option<&str>| {
        ApplicationInstance::new(application.clone(), "shop", None, path).map(|i| i.path().to_string())
    };

    assert_eq!(mount(None).unwrap(), "/");
    assert_eq!(mount(Some("")).unwrap(), "/");
    assert_eq!(mount(Some("store")).unwrap(), "/store/");
    assert_eq!(mount(Some("/store/eu")).unwrap(), "/store/eu/");
    assert_eq!(mount(Some("/store/eu/")).unwrap(), "/store/eu/");

    assert!(mount(Some("//store")).unwrap_err().is_invalid_argument());
    assert!(mount(Some("/store/../etc")).unwrap_err().is_invalid_argument());
    assert!(mount(Some("/\u{017F}tore")).unwrap_err().is_invalid_argument());
}

#[test]
fn vhost_is_referenced_by_id() {
    let (application, _) = application_with(&[]);
    let vhost = VHost::new("shop.example.com").unwrap();

    let instance = ApplicationInstance::new(application, "shop", Some(&vhost), None).unwrap();

    assert_eq!(instance.vhost(), Some(vhost.id()));
    assert_eq!(*instance.state(), ApplicationState::Pending);
}

// ============================================================================
// Packages and rollback
// ============================================================================

#[test]
fn foreign_package_is_rejected() {
    let (application, _) = application_with(&["1.0.0"]);
    let mut instance = ApplicationInstance::new(application, "shop", None, None).unwrap();

    let foreign = package("acme/blog", "1.0.0");
    let err = instance.set_package(&foreign).unwrap_err();

    assert!(err.is_logic());
    assert!(instance.package().is_none());
}

#[test]
fn package_with_build_id_must_be_registered_as_such() {
    let (application, mut packages) = application_with(&["1.0.0"]);
    let mut instance = ApplicationInstance::new(application, "shop", None, None).unwrap();

    let built = &mut packages[0];
    built.set_build_id("build.42").unwrap();
    assert_eq!(built.id(), "acme/shop@1.0.0+build.42");

    assert!(instance.set_package(&*built).unwrap_err().is_logic());
}

#[test]
fn rollback_restores_previous_package_once() {
    let (application, packages) = application_with(&["1.0.0", "1.1.0"]);
    let mut instance = ApplicationInstance::new(application, "shop", None, None).unwrap();

    instance.set_package(&packages[0]).unwrap();
    instance.set_user_parameters(params(&[("mode", "fast")]));

    instance.set_package(&packages[1]).unwrap();
    instance.set_user_parameters(params(&[("mode", "safe")]));

    assert_eq!(instance.package().map(|p| p.id()), Some("acme/shop@1.1.0".to_string()));
    assert_eq!(
        instance.previous_package().map(|p| p.id()),
        Some("acme/shop@1.0.0".to_string())
    );

    instance.rollback().unwrap();
    assert_eq!(instance.package().map(|p| p.id()), Some("acme/shop@1.0.0".to_string()));
    assert_eq!(instance.user_parameters(), &params(&[("mode", "fast")]));
    assert!(instance.previous_package().is_none());

    let err = instance.rollback().unwrap_err();
    assert!(err.is_logic());
}

#[test]
fn rollback_without_history_fails() {
    let (application, _) = application_with(&["1.0.0"]);
    let mut instance = ApplicationInstance::new(application, "shop", None, None).unwrap();

    assert!(instance.rollback().unwrap_err().is_logic());
}

// ============================================================================
// Removal and export
// ============================================================================

#[test]
fn remove_marks_instance_as_removing() {
    let (application, _) = application_with(&[]);
    let mut instance = ApplicationInstance::new(application, "shop", None, None).unwrap();
    instance.set_state("deployed");

    instance.remove();

    assert!(instance.is_removed());
    assert_eq!(*instance.state(), ApplicationState::Removing);
}

#[test]
fn export_uses_camel_case_keys() {
    let (application, packages) = application_with(&["1.0.0"]);
    let mut instance = ApplicationInstance::new(application, "shop", None, Some("store")).unwrap();
    instance.set_package(&packages[0]).unwrap();
    instance.set_label("Shop");

    let json = serde_json::to_value(instance.export().unwrap()).unwrap();

    assert_eq!(json["id"], "shop");
    assert_eq!(json["label"], "Shop");
    assert_eq!(json["application"], "acme/shop");
    assert_eq!(json["package"], "acme/shop@1.0.0");
    assert_eq!(json["path"], "/store/");
    assert_eq!(json["state"], "pending");
    assert_eq!(json["isRemoved"], false);
}
