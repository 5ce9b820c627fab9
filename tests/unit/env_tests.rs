//! Unit tests for the environment overlay and value interpolation.

use std::collections::{BTreeMap, HashMap};

use serial_test::serial;

use buildwire::shell::{interpolate_values, EnvOverlay};

fn base() -> HashMap<String, String> {
    HashMap::from([
        ("PATH".to_owned(), "/usr/bin".to_owned()),
        ("HOME".to_owned(), "/home/ci".to_owned()),
    ])
}

#[test]
fn overrides_win_over_inherited_values() {
    let env = EnvOverlay::new().var("HOME", "/tmp/build").resolve_with(&base());

    assert_eq!(env["HOME"], "/tmp/build");
    assert_eq!(env["PATH"], "/usr/bin");
}

#[test]
fn dollar_brace_reference_is_interpolated() {
    let env = EnvOverlay::new()
        .var("PATH", "${PATH}:/opt/tool/bin")
        .resolve_with(&base());
    assert_eq!(env["PATH"], "/usr/bin:/opt/tool/bin");
}

#[test]
fn dollar_reference_is_interpolated() {
    let env = EnvOverlay::new()
        .var("PATH", "/opt/tool/bin:$PATH")
        .resolve_with(&base());
    assert_eq!(env["PATH"], "/opt/tool/bin:/usr/bin");
}

#[test]
fn bare_name_is_interpolated() {
    let env = EnvOverlay::new()
        .var("PATH", "PATH:/venv/bin")
        .resolve_with(&base());
    assert_eq!(env["PATH"], "/usr/bin:/venv/bin");
}

#[test]
fn missing_base_variable_interpolates_as_empty() {
    let env = EnvOverlay::new()
        .var("PYTHONPATH", "$PYTHONPATH:/src")
        .resolve_with(&base());
    assert_eq!(env["PYTHONPATH"], ":/src");
}

#[test]
fn other_variable_names_are_left_alone() {
    let env = EnvOverlay::new()
        .var("GREETING", "hello $HOME")
        .resolve_with(&base());
    assert_eq!(env["GREETING"], "hello $HOME");
}

#[test]
fn interpolated_value_is_not_expanded_again() {
    let base = HashMap::from([("X".to_owned(), "$1 and ${X}".to_owned())]);
    let env = EnvOverlay::new().var("X", "[$X]").resolve_with(&base);
    assert_eq!(env["X"], "[$1 and ${X}]");
}

#[test]
fn isolated_overlay_contains_only_overrides() {
    let env = EnvOverlay::new()
        .inherit(false)
        .vars([("A", "1"), ("PATH", "$PATH:/x")])
        .resolve_with(&base());

    assert_eq!(env.len(), 2);
    assert_eq!(env["A"], "1");
    assert_eq!(env["PATH"], "/usr/bin:/x");
}

#[test]
fn builder_accessors_reflect_configuration() {
    let overlay = EnvOverlay::new().inherit(false).var("A", "1").var("A", "2");
    assert!(!overlay.inherits());
    assert_eq!(overlay.overrides().len(), 1);
    assert_eq!(overlay.overrides()["A"], "2");
    assert!(EnvOverlay::default().inherits());
}

#[test]
fn interpolate_values_writes_into_target() {
    let mut target = HashMap::new();
    let overrides = BTreeMap::from([("PATH".to_owned(), "${PATH}:/y".to_owned())]);
    interpolate_values(&mut target, &overrides, &base());
    assert_eq!(target["PATH"], "/usr/bin:/y");
}

#[test]
#[serial]
fn resolve_reads_process_environment() {
    std::env::set_var("BUILDWIRE_ENV_TEST", "base");
    let env = EnvOverlay::new()
        .var("BUILDWIRE_ENV_TEST", "$BUILDWIRE_ENV_TEST-extended")
        .resolve();
    std::env::remove_var("BUILDWIRE_ENV_TEST");

    assert_eq!(env["BUILDWIRE_ENV_TEST"], "base-extended");
}

#[test]
#[serial]
fn resolved_overrides_leave_out_inherited_variables() {
    std::env::set_var("BUILDWIRE_OVERRIDE_TEST", "/base");
    let resolved = EnvOverlay::new()
        .var("BUILDWIRE_OVERRIDE_TEST", "${BUILDWIRE_OVERRIDE_TEST}/bin")
        .var("STEP", "test")
        .resolved_overrides();
    std::env::remove_var("BUILDWIRE_OVERRIDE_TEST");

    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved["BUILDWIRE_OVERRIDE_TEST"], "/base/bin");
    assert_eq!(resolved["STEP"], "test");
}
