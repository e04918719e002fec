//! End-to-end scenarios over the in-memory backend.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{json, Value};

    use trellis_client::{
        BatchOpResult, BatchOperation, ClientConfig, ClientError, DataClient, ErrorKind,
        RetryConfig,
    };
    use trellis_store::DocPath;

    use crate::harness::{FaultMode, FlakyStore, TestEnv};

    fn fast_retry() -> ClientConfig {
        ClientConfig {
            retry: RetryConfig {
                max_retries: 3,
                initial_backoff: Duration::from_millis(1),
                jitter: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_write_then_read_returns_exact_value() {
        let env = TestEnv::new();
        let (ctx, ws) = env.session("alice", "ws1");

        let value = json!({"title": "Demo", "tags": ["a", "b"], "count": 3});
        env.client.write(&ctx, &ws, "/doc", value.clone()).await.unwrap();
        assert_eq!(env.client.read(&ctx, &ws, "/doc").await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn test_never_written_paths() {
        let env = TestEnv::new();
        let (ctx, ws) = env.session("alice", "ws1");

        assert_eq!(env.client.read(&ctx, &ws, "/ghost").await.unwrap(), None);
        let (value, was_default) = env
            .client
            .read_with_default(&ctx, &ws, "/ghost", json!("fallback"))
            .await
            .unwrap();
        assert_eq!(value, json!("fallback"));
        assert!(was_default);
    }

    #[tokio::test]
    async fn test_invalid_batch_leaves_store_unchanged() {
        let env = TestEnv::new();
        let (ctx, ws) = env.session("alice", "ws1");
        env.client.write(&ctx, &ws, "/pre", json!("old")).await.unwrap();

        // duplicate write paths fail validation; nothing may change
        let ops = vec![
            BatchOperation::Write {
                path: DocPath::parse("/pre").unwrap(),
                value: json!("new"),
            },
            BatchOperation::Write {
                path: DocPath::parse("/other").unwrap(),
                value: json!(1),
            },
            BatchOperation::Write {
                path: DocPath::parse("/other").unwrap(),
                value: json!(2),
            },
        ];
        let err = env.client.batch(&ctx, &ws, ops).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(
            env.client.read(&ctx, &ws, "/pre").await.unwrap(),
            Some(json!("old"))
        );
        assert_eq!(env.client.read(&ctx, &ws, "/other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_tree_segment_boundary() {
        let env = TestEnv::new();
        let (ctx, ws) = env.session("alice", "ws1");
        env.client.write(&ctx, &ws, "/a/one", json!(1)).await.unwrap();
        env.client.write(&ctx, &ws, "/a/two/deep", json!(2)).await.unwrap();
        env.client.write(&ctx, &ws, "/ab", json!(3)).await.unwrap();

        let tree = env.client.read_tree(&ctx, &ws, "/a").await.unwrap();
        assert_eq!(tree.len(), 2);
        assert!(tree.contains_key(&DocPath::parse("/a/one").unwrap()));
        assert!(tree.contains_key(&DocPath::parse("/a/two/deep").unwrap()));
        assert!(!tree.contains_key(&DocPath::parse("/ab").unwrap()));
    }

    #[tokio::test]
    async fn test_batch_of_26_fails_before_contacting_store() {
        let env = TestEnv::new();
        let (ctx, ws) = env.session("alice", "ws1");

        let ops: Vec<_> = (0..26)
            .map(|i| BatchOperation::Write {
                path: DocPath::parse(&format!("/n/{}", i)).unwrap(),
                value: json!(i),
            })
            .collect();
        let err = env.client.batch(&ctx, &ws, ops).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooManyItems);
        assert!(env.store.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_path_misses_within_ttl() {
        let env = TestEnv::new();
        let (ctx, ws) = env.session("alice", "ws1");
        env.client.write(&ctx, &ws, "/x", json!(1)).await.unwrap();

        env.client.read(&ctx, &ws, "/x").await.unwrap();
        let hits_before = env.client.cache().stats().hits;

        env.client
            .cache()
            .invalidate_path(&ws, &DocPath::parse("/x").unwrap());

        // next lookup misses even though the TTL has not elapsed
        env.client.read(&ctx, &ws, "/x").await.unwrap();
        let stats = env.client.cache().stats();
        assert_eq!(stats.hits, hits_before);
        assert!(stats.invalidations >= 1);
    }

    #[tokio::test]
    async fn test_mv_flips_existence_across_subtree() {
        let env = TestEnv::new();
        let (ctx, ws) = env.session("alice", "ws1");
        env.fs.write(&ctx, &ws, "/a/x", json!(1)).await.unwrap();
        env.fs.write(&ctx, &ws, "/a/y/z", json!(2)).await.unwrap();

        env.fs.mv(&ctx, &ws, "/a", "/b").await.unwrap();

        assert!(!env.fs.exists(&ctx, &ws, "/a").await.unwrap());
        assert!(env.fs.exists(&ctx, &ws, "/b").await.unwrap());
        assert!(env.fs.exists(&ctx, &ws, "/b/y/z").await.unwrap());
    }

    #[tokio::test]
    async fn test_sessions_scenario() {
        crate::harness::init_tracing();
        let env = TestEnv::new();
        let (ctx, ws) = env.session("alice", "ws1");

        env.seed(
            &ctx,
            &ws,
            &[
                ("/sessions/42/name", json!("Demo")),
                ("/sessions/42/pages/p1/type", json!("swot")),
            ],
        )
        .await
        .unwrap();

        let tree = env.client.read_tree(&ctx, &ws, "/sessions/42").await.unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(
            tree.get(&DocPath::parse("/sessions/42/name").unwrap()),
            Some(&json!("Demo"))
        );
        assert_eq!(
            tree.get(&DocPath::parse("/sessions/42/pages/p1/type").unwrap()),
            Some(&json!("swot"))
        );

        let children = env.fs.ls(&ctx, &ws, "/sessions/42").await.unwrap();
        assert_eq!(children, vec!["name".to_string(), "pages".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_writers_last_commit_wins() {
        let env = TestEnv::new();
        let (ctx, ws) = env.session("alice", "ws1");

        let c1 = env.client.clone();
        let c2 = env.client.clone();
        let (ctx1, ws1) = (ctx.clone(), ws.clone());
        let (ctx2, ws2) = (ctx.clone(), ws.clone());
        let (a, b) = tokio::join!(
            async move { c1.write(&ctx1, &ws1, "/x", json!("A")).await },
            async move { c2.write(&ctx2, &ws2, "/x", json!("B")).await },
        );
        a.unwrap();
        b.unwrap();

        // both completed; the stored value is one of the two
        let value = env.client.read(&ctx, &ws, "/x").await.unwrap().unwrap();
        assert!(value == json!("A") || value == json!("B"));

        // after the next commit's invalidation no stale value is served
        env.client.write(&ctx, &ws, "/x", json!("C")).await.unwrap();
        assert_eq!(
            env.client.read(&ctx, &ws, "/x").await.unwrap(),
            Some(json!("C"))
        );
    }

    #[tokio::test]
    async fn test_workspace_isolation_end_to_end() {
        let env = TestEnv::new();
        let (ctx1, ws1) = env.session("alice", "ws1");
        let (ctx2, ws2) = env.session("bob", "ws2");

        env.client.write(&ctx1, &ws1, "/shared", json!("ws1")).await.unwrap();
        env.client.write(&ctx2, &ws2, "/shared", json!("ws2")).await.unwrap();

        assert_eq!(
            env.client.read(&ctx1, &ws1, "/shared").await.unwrap(),
            Some(json!("ws1"))
        );
        assert_eq!(
            env.client.read(&ctx2, &ws2, "/shared").await.unwrap(),
            Some(json!("ws2"))
        );

        // cross-workspace access is denied, never silently substituted
        let err = env.client.read(&ctx1, &ws2, "/shared").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn test_transient_faults_recovered_by_retry() {
        let store = Arc::new(FlakyStore::new());
        let client = DataClient::new(store.clone(), fast_retry());
        let ws = trellis_store::WorkspaceId::new("ws1");
        let ctx = trellis_client::SessionContext::new(
            trellis_store::ActorId::new("alice"),
            ws.clone(),
        );

        client.write(&ctx, &ws, "/r", json!(1)).await.unwrap();
        client.cache().clear();

        store.inject(FaultMode::FailTimes(2));
        assert_eq!(client.read(&ctx, &ws, "/r").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_as_timeout() {
        let store = Arc::new(FlakyStore::new());
        let client = DataClient::new(store.clone(), fast_retry());
        let ws = trellis_store::WorkspaceId::new("ws1");
        let ctx = trellis_client::SessionContext::new(
            trellis_store::ActorId::new("alice"),
            ws.clone(),
        );

        store.inject(FaultMode::AlwaysFail);
        let err = client.read(&ctx, &ws, "/r").await.unwrap_err();
        match err {
            ClientError::Timeout { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mv_copy_failure_leaves_source_intact() {
        let store = Arc::new(FlakyStore::new());
        let client = Arc::new(DataClient::new(store.clone(), fast_retry()));
        let fs = trellis_fs::FileSystem::new(client.clone());
        let ws = trellis_store::WorkspaceId::new("ws1");
        let ctx = trellis_client::SessionContext::new(
            trellis_store::ActorId::new("alice"),
            ws.clone(),
        );

        // 28 documents: 56 move items, forcing copy-then-delete
        for i in 0..28 {
            fs.write(&ctx, &ws, &format!("/src/{}", i), json!(i))
                .await
                .unwrap();
        }

        // first copy transaction commits, everything after fails
        store.fail_transact_from(2);
        let err = fs.mv(&ctx, &ws, "/src", "/dst").await.unwrap_err();
        match err {
            trellis_fs::FsError::PartialMove { copied, .. } => assert_eq!(copied, 25),
            other => panic!("expected PartialMove, got {:?}", other),
        }

        // the source subtree is still a complete copy
        let remaining = client
            .scan_subtree(&ctx, &ws, &DocPath::parse("/src").unwrap())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 28);
    }

    #[tokio::test]
    async fn test_batch_results_ordered() {
        let env = TestEnv::new();
        let (ctx, ws) = env.session("alice", "ws1");
        env.client.write(&ctx, &ws, "/a", json!("a")).await.unwrap();

        let results = env
            .client
            .batch(
                &ctx,
                &ws,
                vec![
                    BatchOperation::Write {
                        path: DocPath::parse("/b").unwrap(),
                        value: json!("b"),
                    },
                    BatchOperation::Read {
                        path: DocPath::parse("/a").unwrap(),
                    },
                    BatchOperation::Read {
                        path: DocPath::parse("/b").unwrap(),
                    },
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            results[0],
            BatchOpResult::Written(DocPath::parse("/b").unwrap())
        );
        assert_eq!(results[1], BatchOpResult::Read(Some(json!("a"))));
        // reads observe pre-batch state, before /b committed
        assert_eq!(results[2], BatchOpResult::Read(None));
    }

    #[tokio::test]
    async fn test_tombstone_policy_end_to_end() {
        let env = TestEnv::new();
        let (ctx, ws) = env.session("alice", "ws1");
        env.client.write(&ctx, &ws, "/d/doc", json!(1)).await.unwrap();
        env.client.write(&ctx, &ws, "/d/doc", Value::Null).await.unwrap();

        // exists, value absent
        assert_eq!(
            env.client.read(&ctx, &ws, "/d/doc").await.unwrap(),
            Some(Value::Null)
        );
        assert!(env.fs.exists(&ctx, &ws, "/d/doc").await.unwrap());

        // excluded from listings and tree reads
        assert!(env.fs.ls(&ctx, &ws, "/d").await.unwrap().is_empty());
        assert!(env.client.read_tree(&ctx, &ws, "/d").await.unwrap().is_empty());
    }
}
