// tests/demo_fixtures.rs
//
// The shipped demo config must load and every demo source must refresh
// cleanly from its fixture.

use std::path::Path;

use dashboard_feed::{CycleOutcome, Feed, FeedConfig};

#[tokio::test]
async fn demo_config_refreshes_every_source() {
    let cfg = FeedConfig::load_from(Path::new("demo/feed.toml")).expect("demo config");
    let feed = Feed::from_config(&cfg).expect("feed from demo config");

    let mut sub = feed.hub().subscribe();
    for s in feed.sources() {
        assert_eq!(
            feed.scheduler().run_cycle(s).await,
            CycleOutcome::Updated,
            "source {} should refresh from its fixture",
            s.name
        );
    }

    assert_eq!(feed.cache().populated(), feed.sources().len());
    let summary = feed.cache().get("summary").expect("summary cached");
    assert_eq!(summary.payload[0]["UsageInWatt"], 412);

    let mut names = Vec::new();
    while let Some(ev) = sub.try_recv() {
        names.push(ev.name);
    }
    assert_eq!(names, vec!["summary", "lastHour", "last24Hours"]);
}
