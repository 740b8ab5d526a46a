// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use trackrs::domain::models::job_batch::{JobBatch, JobBatchStatus};
use trackrs::domain::services::notifier::EmailKind;
use trackrs::workers::shard_progress::{finalize_shard, ShardOutcome};
use uuid::Uuid;

use crate::integration::helpers::mocks::{MockBatchRepo, MockNotifier, MockResultRepo};

fn batch_with_shards(total_batches: i32, email: Option<&str>) -> JobBatch {
    let mut batch = JobBatch::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        email.map(|e| e.to_string()),
        total_batches * 5,
        total_batches,
        "sk-test".to_string(),
        "gpt-4o-mini".to_string(),
        false,
        None,
        vec!["Acme".to_string()],
        vec![],
        vec![],
    );
    batch.status = JobBatchStatus::Processing;
    batch
}

#[tokio::test]
async fn test_single_shard_success_reaches_completed() {
    let batch = batch_with_shards(1, Some("user@example.com"));
    let batch_id = batch.id;
    let batch_repo = MockBatchRepo::with_batch(batch);
    let result_repo = MockResultRepo::new(true);
    let notifier = MockNotifier::new();

    finalize_shard(
        &batch_repo,
        &result_repo,
        &notifier,
        Some(batch_id),
        0,
        false,
        ShardOutcome::Completed,
    )
    .await
    .unwrap();

    let updated = batch_repo.get(batch_id).unwrap();
    assert_eq!(updated.completed_batches, 1);
    assert_eq!(updated.failed_batches, 0);
    assert_eq!(updated.status, JobBatchStatus::Completed);
    assert!(updated.completed_at.is_some());
    assert_eq!(notifier.sent_kinds(), vec![EmailKind::Succeeded]);
}

#[tokio::test]
async fn test_partial_failure_reaches_completed_with_errors() {
    let batch = batch_with_shards(2, Some("user@example.com"));
    let batch_id = batch.id;
    let batch_repo = MockBatchRepo::with_batch(batch);
    let result_repo = MockResultRepo::new(true);
    let notifier = MockNotifier::new();

    finalize_shard(
        &batch_repo,
        &result_repo,
        &notifier,
        Some(batch_id),
        0,
        false,
        ShardOutcome::Completed,
    )
    .await
    .unwrap();

    // 第一个分片后还不是终态
    let midway = batch_repo.get(batch_id).unwrap();
    assert_eq!(midway.status, JobBatchStatus::Processing);
    assert!(midway.completed_at.is_none());

    finalize_shard(
        &batch_repo,
        &result_repo,
        &notifier,
        Some(batch_id),
        1,
        false,
        ShardOutcome::Failed("upstream returned empty results".to_string()),
    )
    .await
    .unwrap();

    let updated = batch_repo.get(batch_id).unwrap();
    assert_eq!(updated.completed_batches, 1);
    assert_eq!(updated.failed_batches, 1);
    assert_eq!(updated.status, JobBatchStatus::CompletedWithErrors);
    assert_eq!(
        notifier.sent_kinds(),
        vec![EmailKind::Succeeded, EmailKind::Failed]
    );
}

#[tokio::test]
async fn test_all_failed_reaches_failed() {
    let batch = batch_with_shards(2, Some("user@example.com"));
    let batch_id = batch.id;
    let batch_repo = MockBatchRepo::with_batch(batch);
    let result_repo = MockResultRepo::new(false);
    let notifier = MockNotifier::new();

    for shard in 0..2 {
        finalize_shard(
            &batch_repo,
            &result_repo,
            &notifier,
            Some(batch_id),
            shard,
            false,
            ShardOutcome::Failed("boom".to_string()),
        )
        .await
        .unwrap();
    }

    let updated = batch_repo.get(batch_id).unwrap();
    assert_eq!(updated.status, JobBatchStatus::Failed);
    assert_eq!(updated.failed_batches, 2);
    assert_eq!(
        notifier.sent_kinds(),
        vec![EmailKind::Failed, EmailKind::Failed]
    );
}

#[tokio::test]
async fn test_replay_does_not_double_count() {
    let batch = batch_with_shards(1, Some("user@example.com"));
    let batch_id = batch.id;
    let batch_repo = MockBatchRepo::with_batch(batch);
    let result_repo = MockResultRepo::new(true);
    let notifier = MockNotifier::new();

    // 同一分片的完成消息投递三次
    for _ in 0..3 {
        finalize_shard(
            &batch_repo,
            &result_repo,
            &notifier,
            Some(batch_id),
            0,
            false,
            ShardOutcome::Completed,
        )
        .await
        .unwrap();
    }

    let updated = batch_repo.get(batch_id).unwrap();
    assert_eq!(updated.completed_batches, 1);
    assert_eq!(updated.failed_batches, 0);
    assert_eq!(updated.status, JobBatchStatus::Completed);
    // 恰好一封邮件
    assert_eq!(notifier.sent_kinds(), vec![EmailKind::Succeeded]);
}

#[tokio::test]
async fn test_nightly_shard_is_a_noop() {
    let batch = batch_with_shards(1, Some("user@example.com"));
    let batch_id = batch.id;
    let batch_repo = MockBatchRepo::with_batch(batch);
    let result_repo = MockResultRepo::new(true);
    let notifier = MockNotifier::new();

    finalize_shard(
        &batch_repo,
        &result_repo,
        &notifier,
        Some(batch_id),
        0,
        true,
        ShardOutcome::Completed,
    )
    .await
    .unwrap();

    let updated = batch_repo.get(batch_id).unwrap();
    assert_eq!(updated.completed_batches, 0);
    assert!(notifier.sent_kinds().is_empty());
}

#[tokio::test]
async fn test_missing_batch_id_is_a_noop() {
    let batch_repo = MockBatchRepo::with_batch(batch_with_shards(1, None));
    let result_repo = MockResultRepo::new(true);
    let notifier = MockNotifier::new();

    finalize_shard(
        &batch_repo,
        &result_repo,
        &notifier,
        None,
        0,
        false,
        ShardOutcome::Completed,
    )
    .await
    .unwrap();

    assert!(notifier.sent_kinds().is_empty());
}

#[tokio::test]
async fn test_no_email_address_skips_notification() {
    let batch = batch_with_shards(1, None);
    let batch_id = batch.id;
    let batch_repo = MockBatchRepo::with_batch(batch);
    let result_repo = MockResultRepo::new(true);
    let notifier = MockNotifier::new();

    finalize_shard(
        &batch_repo,
        &result_repo,
        &notifier,
        Some(batch_id),
        0,
        false,
        ShardOutcome::Completed,
    )
    .await
    .unwrap();

    // 计数照常推进，只是没有邮件
    let updated = batch_repo.get(batch_id).unwrap();
    assert_eq!(updated.status, JobBatchStatus::Completed);
    assert!(notifier.sent_kinds().is_empty());
}

#[tokio::test]
async fn test_success_email_requires_fulfilled_rows() {
    let batch = batch_with_shards(1, Some("user@example.com"));
    let batch_id = batch.id;
    let batch_repo = MockBatchRepo::with_batch(batch);
    // 分片里没有任何已完成的行
    let result_repo = MockResultRepo::new(false);
    let notifier = MockNotifier::new();

    finalize_shard(
        &batch_repo,
        &result_repo,
        &notifier,
        Some(batch_id),
        0,
        false,
        ShardOutcome::Completed,
    )
    .await
    .unwrap();

    assert!(notifier.sent_kinds().is_empty());
}
