//! End-to-end scenarios for the command bus, optimistic masking, and
//! reconnect reconciliation.

#[cfg(test)]
mod tests {
    use serde_json::json;

    use trellis_store::DocPath;
    use trellis_sync::{
        Command, CommandState, ConnectionState, ConnectionTracker, PathState, ReconnectConfig,
        SaveState,
    };

    use crate::harness::TestEnv;

    fn path(p: &str) -> DocPath {
        DocPath::parse(p).unwrap()
    }

    #[tokio::test]
    async fn test_command_commit_notifies_subscribers() {
        let env = TestEnv::new();
        let (ctx, _ws) = env.session("alice", "ws1");
        let mut events = env.bus.subscribe();

        env.bus
            .execute(
                &ctx,
                Command::Write {
                    path: path("/doc"),
                    value: json!(1),
                },
            )
            .await
            .unwrap();

        let states: Vec<CommandState> =
            (0..3).map(|_| events.try_recv().unwrap().state).collect();
        assert_eq!(
            states,
            vec![
                CommandState::Created,
                CommandState::Executing,
                CommandState::Committed
            ]
        );
    }

    #[tokio::test]
    async fn test_commit_refreshes_masked_read() {
        let env = TestEnv::new();
        let (ctx, ws) = env.session("alice", "ws1");
        let p = path("/doc");

        env.bus
            .execute(
                &ctx,
                Command::Write {
                    path: p.clone(),
                    value: json!("new"),
                },
            )
            .await
            .unwrap();

        let confirmed = env.client.read(&ctx, &ws, "/doc").await.unwrap();
        assert_eq!(env.tracker.masked_read(&ws, &p, confirmed), Some(json!("new")));
        assert_eq!(
            env.tracker.state(&ws, &p),
            Some(PathState::Confirmed(json!("new")))
        );
    }

    #[tokio::test]
    async fn test_failed_command_save_state_and_rollback() {
        let env = TestEnv::new();
        let (ctx, ws) = env.session("alice", "ws1");
        let p = path("/dir");

        env.bus
            .execute(&ctx, Command::Mkdir { path: p.clone() })
            .await
            .unwrap();

        env.bus
            .execute(
                &ctx,
                Command::Write {
                    path: p.clone(),
                    value: json!("not allowed"),
                },
            )
            .await
            .unwrap_err();

        match env.bus.save_states().get(&ws, &p) {
            Some(SaveState::SaveFailed { kind, retryable }) => {
                assert_eq!(kind, "not_a_directory");
                assert!(!retryable);
            }
            other => panic!("expected SaveFailed, got {:?}", other),
        }
        assert!(matches!(
            env.tracker.state(&ws, &p),
            Some(PathState::RolledBack { .. })
        ));
        assert!(!env.tracker.is_dirty(&ws));
    }

    #[tokio::test]
    async fn test_retry_reissues_identical_command() {
        let env = TestEnv::new();
        let (ctx, ws) = env.session("alice", "ws1");
        let p = path("/doc");
        let command = Command::Write {
            path: p.clone(),
            value: json!("v"),
        };

        env.bus.execute(&ctx, command.clone()).await.unwrap();
        // re-issuing the identical command is idempotent at the value level
        env.bus.execute(&ctx, command).await.unwrap();

        assert_eq!(env.bus.save_states().get(&ws, &p), Some(SaveState::Saved));
        assert_eq!(
            env.client.read(&ctx, &ws, "/doc").await.unwrap(),
            Some(json!("v"))
        );
    }

    #[tokio::test]
    async fn test_reconnect_rolls_back_all_pending() {
        let env = TestEnv::new();
        let (_ctx, ws) = env.session("alice", "ws1");

        for i in 0..3 {
            env.tracker
                .add_optimistic(&ws, &path(&format!("/p/{}", i)), json!(i), None);
        }
        assert!(env.tracker.is_dirty(&ws));

        let tracker = ConnectionTracker::new(ReconnectConfig {
            jitter_fraction: 0.0,
            ..Default::default()
        });
        tracker.on_disconnected();
        assert!(matches!(
            tracker.state(),
            ConnectionState::Reconnecting { .. }
        ));

        // connection restored: pending state is discarded before re-sync
        tracker.on_connected();
        let rolled = env.tracker.rollback_all(&ws, "reconnect");
        assert_eq!(rolled, 3);
        assert!(!env.tracker.is_dirty(&ws));
        assert!(tracker.is_connected());
    }
}
