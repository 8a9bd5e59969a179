use super::*;
use crate::mission::{MissionErrorKind, MissionKind};
use crate::postprocess::{Algorithm, Container, PostProcessingSpec};

fn video_mission() -> NewMission {
    let video = SourceRecord::new("https://cdn.example/v.mp4", SourceRole::Primary);
    let audio = SourceRecord::new("https://cdn.example/a.m4a", SourceRole::Secondary);
    NewMission {
        kind: MissionKind::Video,
        final_path: "/downloads/clip.mp4".into(),
        post: PostProcessingSpec::new(Algorithm::MultiTrackMux(Container::Mp4)),
        record: RecoveryRecord::new(vec![video, audio]),
        settings: MissionSettings {
            page_url: Some("https://video.example/watch?v=1".to_string()),
            ..Default::default()
        },
    }
}

fn plan(record: &mut RecoveryRecord) {
    record.sources[0].length = Some(5_000);
    record.sources[0].offset = 2_000;
    record.sources[0].validator = Some("\"v1\"".to_string());
    record.sources[0].mode = TransferMode::Blocks { first: 1, count: 3 };
    record.sources[1].length = Some(1_000);
    record.sources[1].offset = 1_000;
    record.sources[1].mode = TransferMode::Blocks { first: 0, count: 1 };
    record.planned = true;
    record.block_size = 2_000;
    record.block_count = 4;
    record.reserved = 1_000;
    record.bitmap = vec![0b0101];
}

#[tokio::test]
async fn add_and_get_round_trips_everything() {
    let db = MissionDb::open_memory().await.unwrap();
    let id = db.add_mission(&video_mission()).await.unwrap();

    let m = db.get_mission(id).await.unwrap().unwrap();
    assert_eq!(m.id, id);
    assert_eq!(m.kind, MissionKind::Video);
    assert_eq!(m.state, QueueState::Queued);
    assert_eq!(m.final_path.to_string_lossy(), "/downloads/clip.mp4");
    assert_eq!(m.post.algorithm, Algorithm::MultiTrackMux(Container::Mp4));
    assert_eq!(m.record.sources.len(), 2);
    assert!(!m.record.planned);
    assert_eq!(m.settings.page_url.as_deref(), Some("https://video.example/watch?v=1"));
    assert!(db.get_mission(id + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn checkpoint_keeps_layout_and_bitmap() {
    let db = MissionDb::open_memory().await.unwrap();
    let id = db.add_mission(&video_mission()).await.unwrap();
    let mut record = db.get_mission(id).await.unwrap().unwrap().record;
    plan(&mut record);
    db.save_ledger(id, &record).await.unwrap();

    let stored = db.get_mission(id).await.unwrap().unwrap().record;
    assert_eq!(stored, record);
    assert_eq!(db.list_missions().await.unwrap()[0].total_size, Some(6_000));

    db.update_bitmap(id, &[0b1111]).await.unwrap();
    let stored = db.get_mission(id).await.unwrap().unwrap().record;
    assert_eq!(stored.bitmap, vec![0b1111]);
    assert_eq!(stored.sources[0].validator.as_deref(), Some("\"v1\""));
}

#[tokio::test]
async fn clear_ledger_keeps_sources() {
    let db = MissionDb::open_memory().await.unwrap();
    let id = db.add_mission(&video_mission()).await.unwrap();
    let mut record = db.get_mission(id).await.unwrap().unwrap().record;
    plan(&mut record);
    db.save_ledger(id, &record).await.unwrap();

    db.clear_ledger(id).await.unwrap();
    let stored = db.get_mission(id).await.unwrap().unwrap().record;
    assert!(!stored.planned);
    assert!(stored.bitmap.is_empty());
    assert_eq!(stored.sources[1].url, "https://cdn.example/a.m4a");
    assert_eq!(stored.sources[0].length, None);
    assert!(db.clear_ledger(id + 1).await.is_err());
}

#[tokio::test]
async fn error_state_is_recorded_and_cleared() {
    let db = MissionDb::open_memory().await.unwrap();
    let id = db.add_mission(&video_mission()).await.unwrap();
    db.set_error(id, MissionErrorKind::HttpForbidden, "HTTP 403").await.unwrap();

    let m = db.get_mission(id).await.unwrap().unwrap();
    assert_eq!(m.state, QueueState::Error);
    assert_eq!(m.error_kind, Some(MissionErrorKind::HttpForbidden));
    assert_eq!(m.error_message.as_deref(), Some("HTTP 403"));

    db.set_state(id, QueueState::Queued).await.unwrap();
    let m = db.get_mission(id).await.unwrap().unwrap();
    assert_eq!(m.state, QueueState::Queued);
    assert_eq!(m.error_kind, None);
}

#[tokio::test]
async fn queue_claims_oldest_and_recovers_running() {
    let db = MissionDb::open_memory().await.unwrap();
    let first = db.add_mission(&video_mission()).await.unwrap();
    let second = db.add_mission(&video_mission()).await.unwrap();

    assert_eq!(db.next_queued_mission().await.unwrap(), Some(first));
    assert_eq!(db.next_queued_mission().await.unwrap(), Some(second));
    assert_eq!(db.next_queued_mission().await.unwrap(), None);

    assert_eq!(db.recover_running_missions().await.unwrap(), 2);
    let states: Vec<QueueState> =
        db.list_missions().await.unwrap().iter().map(|m| m.state).collect();
    assert_eq!(states, vec![QueueState::Queued, QueueState::Queued]);
}

#[tokio::test]
async fn list_is_newest_first_and_remove_deletes() {
    let db = MissionDb::open_memory().await.unwrap();
    assert!(db.list_missions().await.unwrap().is_empty());
    let a = db.add_mission(&video_mission()).await.unwrap();
    let b = db.add_mission(&video_mission()).await.unwrap();

    let ids: Vec<MissionId> = db.list_missions().await.unwrap().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![b, a]);

    db.remove_mission(a).await.unwrap();
    let ids: Vec<MissionId> = db.list_missions().await.unwrap().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![b]);
}

#[tokio::test]
async fn open_at_creates_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested dir").join("missions.db");
    let db = MissionDb::open_at(&path).await.unwrap();
    db.add_mission(&video_mission()).await.unwrap();
    assert!(path.exists());
}
