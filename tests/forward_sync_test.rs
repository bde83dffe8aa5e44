//! Forward synchronization scenarios: pending scan rows turned into wheel
//! and wheelstack documents, with stack-level failure isolation.

use std::sync::Arc;

use gridsync::service::{ForwardOutcome, ForwardSync, Kicks};
use gridsync::testing::{self, FakeGridApi, FakeLedger, MemoryStaging};
use gridsync::SyncError;
use pretty_assertions::assert_eq;

const ACK_QUEUE: &str = "correct_wheels_list";
const CLEANUP_QUEUE: &str = "failed_wheels_list";

fn setup() -> (Arc<FakeLedger>, Arc<MemoryStaging>, FakeGridApi) {
	let ledger = Arc::new(FakeLedger::new());
	let staging = Arc::new(MemoryStaging::new());
	let api = FakeGridApi::new();
	api.add_platform("pmkBase1", "plat-1");
	(ledger, staging, api)
}

fn forward(ledger: &Arc<FakeLedger>, staging: &Arc<MemoryStaging>, kicks: Kicks) -> ForwardSync {
	ForwardSync::new(&testing::config(), ledger.clone(), staging.clone(), kicks)
}

#[tokio::test]
async fn pending_rows_become_wheels_and_one_wheelstack() {
	let (ledger, staging, api) = setup();
	let row_a = testing::scan_row(555, 1001, 1, 0, 0);
	let row_b = testing::scan_row(555, 1002, 1, 0, 1);
	ledger.seed(vec![row_a.clone(), row_b.clone()]);

	let (kicks, mut receivers) = Kicks::channel();
	let task = forward(&ledger, &staging, kicks);
	let outcome = task.run(&api).await.unwrap();

	assert_eq!(outcome.created_wheelstacks, vec!["stack-1".to_string()]);
	assert!(outcome.failed_wheels.is_empty());

	let wheels = api.created_wheels();
	assert_eq!(wheels.len(), 2);
	assert_eq!(wheels[0].wheel_id, "1001");
	assert_eq!(wheels[0].batch_number, "555");
	assert_eq!(wheels[0].status, "basePlatform");
	assert_eq!(wheels[0].sql_data, row_a);

	let stacks = api.created_stacks();
	assert_eq!(stacks.len(), 1);
	assert_eq!(
		stacks[0].wheels,
		vec!["wheel-1".to_string(), "wheel-2".to_string()]
	);
	assert_eq!(stacks[0].placement_id, "plat-1");
	assert_eq!(stacks[0].row_placement, "1");
	assert_eq!(stacks[0].col_placement, "0");
	assert_eq!(stacks[0].batch_number, "555");
	assert_eq!(stacks[0].max_size, 6);

	// Both rows staged for acknowledgment, serialized as fetched.
	assert_eq!(
		staging.contents(ACK_QUEUE),
		vec![
			serde_json::to_string(&row_a).unwrap(),
			serde_json::to_string(&row_b).unwrap(),
		]
	);
	assert!(staging.contents(CLEANUP_QUEUE).is_empty());

	// The acknowledgment stage was kicked, the cleanup stage was not.
	assert!(receivers.ack.try_recv().is_ok());
	assert!(receivers.cleanup.try_recv().is_err());
}

#[tokio::test]
async fn failed_wheel_abandons_its_stack_and_routes_orphans_to_cleanup() {
	let (ledger, staging, api) = setup();
	ledger.seed(vec![
		testing::scan_row(555, 1001, 1, 0, 0),
		testing::scan_row(555, 1002, 1, 0, 1),
	]);
	api.reject_part(1002);

	let (kicks, mut receivers) = Kicks::channel();
	let task = forward(&ledger, &staging, kicks);
	let outcome = task.run(&api).await.unwrap();

	assert!(outcome.created_wheelstacks.is_empty());
	assert_eq!(outcome.failed_wheels, vec!["wheel-1".to_string()]);

	// No wheelstack was created that references the orphan.
	assert!(api.created_stacks().is_empty());

	assert!(staging.contents(ACK_QUEUE).is_empty());
	assert_eq!(staging.contents(CLEANUP_QUEUE), vec!["wheel-1".to_string()]);

	assert!(receivers.ack.try_recv().is_err());
	assert!(receivers.cleanup.try_recv().is_ok());
}

#[tokio::test]
async fn failure_midway_through_a_stack_orphans_only_prior_wheels() {
	let (ledger, staging, api) = setup();
	ledger.seed(vec![
		testing::scan_row(600, 2001, 2, 4, 0),
		testing::scan_row(600, 2002, 2, 4, 1),
		testing::scan_row(600, 2003, 2, 4, 2),
		testing::scan_row(600, 2004, 2, 4, 3),
		testing::scan_row(600, 2005, 2, 4, 4),
	]);
	api.reject_part(2003);

	let task = forward(&ledger, &staging, Kicks::disconnected());
	let outcome = task.run(&api).await.unwrap();

	assert!(outcome.created_wheelstacks.is_empty());
	assert_eq!(
		outcome.failed_wheels,
		vec!["wheel-1".to_string(), "wheel-2".to_string()]
	);
	// Slots beyond the failure were never attempted.
	assert_eq!(api.created_wheels().len(), 2);
	assert!(api.created_stacks().is_empty());
	assert!(staging.contents(ACK_QUEUE).is_empty());
	assert_eq!(
		staging.contents(CLEANUP_QUEUE),
		vec!["wheel-1".to_string(), "wheel-2".to_string()]
	);
	// The rows stay pending for the next run.
	assert!(ledger.scan_rows().iter().all(|row| row.mark == 0));
}

#[tokio::test]
async fn a_failed_stack_leaves_other_stacks_untouched() {
	let (ledger, staging, api) = setup();
	ledger.seed(vec![
		testing::scan_row(555, 1001, 1, 0, 0),
		testing::scan_row(556, 1101, 1, 1, 0),
		testing::scan_row(556, 1102, 1, 1, 1),
	]);
	api.reject_part(1001);

	let task = forward(&ledger, &staging, Kicks::disconnected());
	let outcome = task.run(&api).await.unwrap();

	// Stack (1, 0) died before creating anything; stack (1, 1) went through.
	assert_eq!(outcome.created_wheelstacks, vec!["stack-1".to_string()]);
	assert!(outcome.failed_wheels.is_empty());
	assert_eq!(staging.contents(ACK_QUEUE).len(), 2);
	assert!(staging.contents(CLEANUP_QUEUE).is_empty());
}

#[tokio::test]
async fn rejected_wheelstack_orphans_its_wheels() {
	let (ledger, staging, api) = setup();
	ledger.seed(vec![
		testing::scan_row(555, 1001, 1, 0, 0),
		testing::scan_row(555, 1002, 1, 0, 1),
	]);
	api.reject_stack(1, 0);

	let (kicks, mut receivers) = Kicks::channel();
	let task = forward(&ledger, &staging, kicks);
	let outcome = task.run(&api).await.unwrap();

	assert!(outcome.created_wheelstacks.is_empty());
	assert_eq!(
		outcome.failed_wheels,
		vec!["wheel-1".to_string(), "wheel-2".to_string()]
	);
	assert!(staging.contents(ACK_QUEUE).is_empty());
	assert_eq!(
		staging.contents(CLEANUP_QUEUE),
		vec!["wheel-1".to_string(), "wheel-2".to_string()]
	);
	assert!(receivers.ack.try_recv().is_err());
	assert!(receivers.cleanup.try_recv().is_ok());
}

#[tokio::test]
async fn unresolved_platform_aborts_before_touching_anything() {
	let (ledger, staging, _) = setup();
	ledger.seed(vec![testing::scan_row(555, 1001, 1, 0, 0)]);
	let api = FakeGridApi::new(); // no platform registered

	let task = forward(&ledger, &staging, Kicks::disconnected());
	let result = task.run(&api).await;

	assert!(matches!(result, Err(SyncError::PlatformNotFound(name)) if name == "pmkBase1"));
	assert!(api.created_wheels().is_empty());
	assert!(staging.contents(ACK_QUEUE).is_empty());
}

#[tokio::test]
async fn empty_feed_is_a_quiet_no_op() {
	let (ledger, staging, api) = setup();

	let (kicks, mut receivers) = Kicks::channel();
	let task = forward(&ledger, &staging, kicks);
	let outcome = task.run(&api).await.unwrap();

	assert_eq!(outcome, ForwardOutcome::default());
	assert!(api.created_wheels().is_empty());
	assert!(receivers.ack.try_recv().is_err());
	assert!(receivers.cleanup.try_recv().is_err());
}

#[test]
fn outcome_serializes_with_upstream_field_names() {
	let outcome = ForwardOutcome {
		created_wheelstacks: vec!["stack-1".into()],
		failed_wheels: vec!["wheel-9".into()],
	};
	assert_eq!(
		serde_json::to_value(&outcome).unwrap(),
		serde_json::json!({
			"createdWheelstacks": ["stack-1"],
			"failedWheels": ["wheel-9"],
		})
	);
}
