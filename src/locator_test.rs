use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_query_resolution() {
    assert_eq!(
        Locator::id("PIN").query(),
        (QueryKind::Id, "PIN".to_string())
    );
    assert_eq!(
        Locator::name("unimart").query(),
        (QueryKind::Css, "[name=\"unimart\"]".to_string())
    );
    assert_eq!(
        Locator::partial_link_text("其他用戶").query(),
        (
            QueryKind::XPath,
            "//a[contains(normalize-space(.), '其他用戶')]".to_string()
        )
    );
}

#[test]
fn test_partial_link_text_with_quote() {
    let (_, query) = Locator::partial_link_text("Today's jobs").query();
    assert_eq!(query, "//a[contains(normalize-space(.), \"Today's jobs\")]");
}

#[test]
fn test_for_task_substitution() {
    let template = Locator::xpath("//a[contains(@href, 'task_id={task_id}')]");
    assert_eq!(
        template.for_task(TaskId(13)),
        Locator::xpath("//a[contains(@href, 'task_id=13')]")
    );

    // Locators without placeholder are untouched
    let plain = Locator::id("btn_OK_PIN");
    assert_eq!(plain.for_task(TaskId(1)), plain);
}

#[test]
fn test_serde_shape() {
    let locator: Locator =
        serde_json::from_str(r#"{"by": "xpath", "value": "//input[@type='password']"}"#).unwrap();
    assert_eq!(locator, Locator::xpath("//input[@type='password']"));

    let json = serde_json::to_value(Locator::link_text("C2C快收便")).unwrap();
    assert_eq!(json["by"], "link_text");
    assert_eq!(json["value"], "C2C快收便");
}

#[test]
fn test_wait_strategies() {
    assert!(WaitFor::Presence.accepts(false, false));
    assert!(WaitFor::Visible.accepts(true, false));
    assert!(!WaitFor::Visible.accepts(false, true));
    assert!(WaitFor::Clickable.accepts(true, true));
    assert!(!WaitFor::Clickable.accepts(true, false));
    assert!(WaitFor::Invisible.accepts(false, true));
    assert!(!WaitFor::Invisible.accepts(true, true));
}

#[test]
fn test_display() {
    assert_eq!(Locator::id("UserName").to_string(), "id=UserName");
    assert_eq!(Locator::css("div.item").to_string(), "css=div.item");
}
