//! Live AWS discovery test - actually calls AWS APIs
//!
//! Runs advisory mode only; nothing is deleted. Marked `#[ignore]` and only
//! runs with:
//! ```
//! SRA_CLEANUP_TEST_PROFILE=your_profile cargo test --test aws_live_integration -- --ignored
//! ```

use sra_cleanup::aws::AwsSessionFactory;
use sra_cleanup::config::{AccountKey, AccountTarget, CleanupConfig, RunMode};
use sra_cleanup::orchestrator::{account_plan, process_account};
use sra_cleanup::provider::SessionFactory;
use sra_cleanup::report::CleanupReport;
use sra_cleanup_test_utils::{get_test_region, test_profile};

/// Discover every resource type in one account without deleting anything
#[tokio::test]
#[ignore]
async fn test_advisory_discovery_against_live_account() {
    let Some(profile) = test_profile() else {
        eprintln!("SRA_CLEANUP_TEST_PROFILE not set, skipping");
        return;
    };
    let region = get_test_region();

    let account = AccountTarget::new(AccountKey::Master, profile);
    let config = CleanupConfig {
        accounts: vec![account.clone()],
        regions: vec![region.clone()],
        ..CleanupConfig::new(RunMode::Advisory)
    };

    let factory = AwsSessionFactory::new(config.regions.clone());
    let session = factory
        .connect(&account)
        .await
        .expect("AWS credentials required for the test profile");

    let plan = account_plan(account.key).unwrap();
    let mut report = CleanupReport::new();
    process_account(&session, &account, &plan, &config, &mut report).await;

    // Advisory mode records counts and listing errors only
    assert_eq!(report.success_count(), 0);
    for entry in report.entries() {
        assert_eq!(entry.resource_name, "listing", "unexpected entry: {entry:?}");
    }
    println!("{}", report.render(RunMode::Advisory));
}
