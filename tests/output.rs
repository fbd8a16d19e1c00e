use daysheet::cell::DayRecord;
use daysheet::output::{format_human, HumanOutput};

#[test]
fn format_human_includes_sections() {
    let mut human = HumanOutput::new("daysheet init: initialized data root");
    human.push_summary("root", "/tmp/ds");
    human.push_detail("created grid.json");
    human.push_warning("sheet Ops missing");
    human.push_next_step("daysheet task add");

    let rendered = format_human(&human);
    assert!(rendered.contains("daysheet init: initialized data root"));
    assert!(rendered.contains("Summary:"));
    assert!(rendered.contains("- root: /tmp/ds"));
    assert!(rendered.contains("Details:"));
    assert!(rendered.contains("- created grid.json"));
    assert!(rendered.contains("Warnings:"));
    assert!(rendered.contains("- sheet Ops missing"));
    assert!(rendered.contains("Next steps:"));
    assert!(rendered.contains("- daysheet task add"));
}

#[test]
fn format_human_omits_empty_sections() {
    let human = HumanOutput::new("daysheet init: nothing to do");
    let rendered = format_human(&human);
    assert_eq!(rendered, "daysheet init: nothing to do");
}

#[test]
fn day_details_list_complete_first() {
    let mut human = HumanOutput::new("Tasks for Alice");
    let mut day = DayRecord::new("Tue 03-Jan");
    day.todo.push("Plan".to_string());
    day.pending.push("Review".to_string());
    day.complete.push("Ship".to_string());
    human.push_day(&day);

    let rendered = format_human(&human);
    let ship = rendered.find("[complete] Ship").expect("complete line");
    let review = rendered.find("[pending] Review").expect("pending line");
    let plan = rendered.find("[todo] Plan").expect("todo line");
    assert!(ship < review && review < plan);
}
