use std::collections::BTreeMap;

use super::*;

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[rstest]
#[case::equality("app=foo", &[("app", "foo")], true)]
#[case::double_equals("app==foo", &[("app", "foo")], true)]
#[case::equality_miss("app=foo", &[("app", "bar")], false)]
#[case::not_equals("tier!=debug", &[("tier", "prod")], true)]
#[case::not_equals_miss("tier!=debug", &[("tier", "debug")], false)]
#[case::not_equals_absent_key("tier!=debug", &[("app", "foo")], true)]
#[case::set_in("env in (prod,staging)", &[("env", "staging")], true)]
#[case::set_in_miss("env in (prod,staging)", &[("env", "dev")], false)]
#[case::set_notin("env notin (prod,staging)", &[("env", "dev")], true)]
#[case::set_notin_absent("env notin (prod,staging)", &[], true)]
#[case::exists("app", &[("app", "anything")], true)]
#[case::exists_miss("app", &[("other", "x")], false)]
#[case::not_exists("!canary", &[("app", "foo")], true)]
#[case::not_exists_miss("!canary", &[("canary", "yes")], false)]
#[case::conjunction("app=foo,tier!=debug", &[("app", "foo"), ("tier", "prod")], true)]
#[case::conjunction_miss("app=foo,tier!=debug", &[("app", "foo"), ("tier", "debug")], false)]
#[case::empty_selector("", &[("anything", "goes")], true)]
fn test_selector_matches(#[case] selector: &str, #[case] pairs: &[(&str, &str)], #[case] expected: bool) {
    let sel: Selector = selector.parse().unwrap();
    assert_eq!(sel.matches(&labels(pairs)), expected);
}

#[rstest]
#[case::missing_parens("env in prod")]
#[case::empty_value_set("env in ()")]
#[case::empty_key("=foo")]
#[case::key_with_spaces("two words=foo")]
fn test_selector_parse_errors(#[case] selector: &str) {
    assert!(selector.parse::<Selector>().is_err());
}

#[rstest]
fn test_selector_display_round_trips() {
    let input = "app=foo,tier!=debug,env in (prod,staging),!canary,has-gpu";
    let sel: Selector = input.parse().unwrap();
    let reparsed: Selector = sel.to_string().parse().unwrap();
    assert_eq!(reparsed, sel);
}

#[rstest]
fn test_selector_whitespace_tolerated() {
    let sel: Selector = " app = foo , env notin ( dev , test ) ".parse().unwrap();
    assert!(sel.matches(&labels(&[("app", "foo"), ("env", "prod")])));
    assert!(!sel.matches(&labels(&[("app", "foo"), ("env", "dev")])));
}
