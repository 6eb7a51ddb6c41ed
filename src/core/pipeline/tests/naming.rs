use crate::core::pipeline::{output_basename, sanitize_subject};

#[test]
fn keeps_alphanumerics_spaces_hyphens_underscores() {
    assert_eq!(
        sanitize_subject("1994-2001 Acura Integra Type_R"),
        "1994-2001 Acura Integra Type_R"
    );
}

#[test]
fn replaces_special_characters_with_underscores() {
    assert_eq!(sanitize_subject("Acura NSX (NA1)"), "Acura NSX _NA1_");
    assert_eq!(sanitize_subject("50/50: cars & bikes?"), "50_50_ cars _ bikes_");
}

#[test]
fn truncates_to_fifty_characters() {
    let long = "x".repeat(80);
    assert_eq!(sanitize_subject(&long).chars().count(), 50);
}

#[test]
fn basename_zero_pads_the_run_index() {
    assert_eq!(output_basename(1, "Supra"), "001_Supra");
    assert_eq!(output_basename(42, "Supra"), "042_Supra");
    assert_eq!(output_basename(123, "Supra"), "123_Supra");
}

#[test]
fn same_subject_different_runs_yield_distinct_names() {
    let first = output_basename(1, "Mazda Miata");
    let second = output_basename(2, "Mazda Miata");
    assert_ne!(first, second);
}
