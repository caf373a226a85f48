#[cfg(test)]
mod diagnostics_tests {
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use tempfile::TempDir;

    use zombie_diag::analysis::{
        self, check_connectivity, collect_connectivity, report, ClusterReport, CollisionScope,
        DiagnosticError, NodeKind, PeerTarget, RetryPolicy,
    };

    const MARKER: &str = "Discovered new external address for our node";

    fn discovery_line(kind: &str, addr: &str) -> String {
        format!("2024-05-01 10:00:00 [{}] {}: {}\n", kind, MARKER, addr)
    }

    fn idle_lines(tag: &str, counts: &[u32]) -> String {
        counts
            .iter()
            .enumerate()
            .map(|(i, c)| {
                format!(
                    "2024-05-01 10:00:{:02} [{}] 💤 Idle ({} peers), best: #{}\n",
                    i, tag, c, i
                )
            })
            .collect()
    }

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            interval: Duration::ZERO,
            min_samples: 1,
        }
    }

    /// A clean cluster: every file has distinct ports
    #[test]
    fn test_scan_ports_clean_cluster() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "Collator2000-01.log",
            &(discovery_line("Orchestrator", "/ip4/127.0.0.1/tcp/30333/ws")
                + &discovery_line("Container-2000", "/ip4/127.0.0.1/tcp/30334")),
        );
        write(
            dir.path(),
            "Collator2000-02.log",
            &(discovery_line("Orchestrator", "/ip4/127.0.0.1/tcp/30335")
                + &discovery_line("Container-2000", "/ip4/127.0.0.1/udp/30336/quic-v1")),
        );
        write(dir.path(), "notes.txt", &discovery_line("Orchestrator", "/ip4/127.0.0.1/tcp/30333"));

        let scan = analysis::scan_ports(dir.path(), "log", &[]).unwrap();
        assert_eq!(scan.discoveries.len(), 2);
        assert_eq!(scan.ownership.len(), 4);
        assert!(scan.collisions.is_clean());
        assert!(scan.ensure_clean().is_ok());
    }

    /// Two node kinds of one process sharing a port
    #[test]
    fn test_scan_ports_intra_file_collision() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "Collator2000-01.log",
            &(discovery_line("Orchestrator", "/ip4/127.0.0.1/tcp/30333")
                + &discovery_line("Container-2000", "/ip4/10.0.0.2/tcp/30333/ws")),
        );

        let scan = analysis::scan_ports(dir.path(), "log", &[]).unwrap();
        assert_eq!(scan.collisions.len(), 1);
        let collision = &scan.collisions.collisions[0];
        assert_eq!(collision.port, 30333);
        assert_eq!(collision.scope, CollisionScope::IntraFile);

        match scan.ensure_clean() {
            Err(DiagnosticError::PortCollision { count, details }) => {
                assert_eq!(count, 1);
                assert!(details.contains("30333"));
                assert!(details.contains("Orchestrator"));
                assert!(details.contains("Container-2000"));
            }
            other => panic!("expected a port collision, got {:?}", other),
        }
    }

    /// Two processes advertising the same port
    #[test]
    fn test_scan_ports_inter_file_collision() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "Collator2000-01.log",
            &discovery_line("Orchestrator", "/ip4/127.0.0.1/tcp/30333"),
        );
        write(
            dir.path(),
            "Collator2000-02.log",
            &discovery_line("Orchestrator", "/ip4/127.0.0.1/tcp/30333"),
        );

        let scan = analysis::scan_ports(dir.path(), "log", &[]).unwrap();
        assert_eq!(scan.collisions.len(), 1);
        assert_eq!(scan.collisions.collisions[0].scope, CollisionScope::InterFile);

        let message = scan.ensure_clean().unwrap_err().to_string();
        assert!(message.contains("Collator2000-01.log"));
        assert!(message.contains("Collator2000-02.log"));
    }

    #[test]
    fn test_scan_ports_reports_missing_kinds() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "Collator2000-01.log",
            &discovery_line("Orchestrator", "/ip4/127.0.0.1/tcp/30333"),
        );

        let expected = vec![NodeKind::new("Orchestrator"), NodeKind::new("Relaychain")];
        let scan = analysis::scan_ports(dir.path(), "log", &expected).unwrap();
        assert_eq!(scan.missing_kinds, vec![NodeKind::new("Relaychain")]);
        assert!(scan.ensure_clean().is_ok());
    }

    #[test]
    fn test_scan_ports_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        assert!(analysis::scan_ports(&dir.path().join("absent"), "log", &[]).is_err());
    }

    #[test]
    fn test_connectivity_healthy_and_isolated_nodes() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "Collator2000-01.log",
            &idle_lines("Container-2000", &[2, 3, 3, 4, 2, 1, 3, 3]),
        );
        write(
            dir.path(),
            "Collator2000-02.log",
            &idle_lines("Container-2000", &[1, 1, 1, 2, 1, 1, 3, 1]),
        );

        let targets = vec![
            PeerTarget::in_dir(dir.path(), "Collator2000-01", "log"),
            PeerTarget::in_dir(dir.path(), "Collator2000-02", "log"),
        ];
        let reports = collect_connectivity(&targets, "Container-2000", fast_policy(), 120);

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].node, "Collator2000-01");
        assert_eq!(reports[0].samples, 8);
        assert_eq!(reports[0].stats.min, 1);
        assert_eq!(reports[0].stats.max, 4);
        assert!(reports[0].passes(0.5));
        assert_eq!(reports[0].sparkline.chars().count(), 8);

        assert_eq!(reports[1].one_peer_samples, 6);
        assert!(!reports[1].passes(0.5));

        match check_connectivity(&reports, 0.5) {
            Err(DiagnosticError::Isolated { node, ones, total, .. }) => {
                assert_eq!(node, "Collator2000-02");
                assert_eq!((ones, total), (6, 8));
            }
            other => panic!("expected isolation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_connectivity_exact_threshold_passes() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "Collator2000-01.log",
            &idle_lines("Container-2000", &[1, 1, 1, 1, 2, 2, 2, 2]),
        );

        let targets = vec![PeerTarget::in_dir(dir.path(), "Collator2000-01", "log")];
        let reports = collect_connectivity(&targets, "Container-2000", fast_policy(), 120);
        assert_eq!(reports[0].one_peer_fraction, 0.5);
        assert!(check_connectivity(&reports, 0.5).is_ok());
    }

    #[test]
    fn test_connectivity_ignores_other_tags() {
        let dir = TempDir::new().unwrap();
        let content = idle_lines("Relaychain", &[1, 1, 1]) + &idle_lines("Container-2000", &[4, 5]);
        write(dir.path(), "Collator2000-01.log", &content);

        let targets = vec![PeerTarget::in_dir(dir.path(), "Collator2000-01", "log")];
        let reports = collect_connectivity(&targets, "Container-2000", fast_policy(), 120);
        assert_eq!(reports[0].samples, 2);
        assert_eq!(reports[0].stats.min, 4);
    }

    #[test]
    fn test_connectivity_empty_series_fails() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Collator2000-01.log", "node started\nno peers yet\n");

        let targets = vec![
            PeerTarget::in_dir(dir.path(), "Collator2000-01", "log"),
            PeerTarget::in_dir(dir.path(), "Collator2000-09", "log"),
        ];
        let reports = collect_connectivity(&targets, "Container-2000", fast_policy(), 120);
        assert!(reports.iter().all(|r| r.samples == 0));
        assert!(reports.iter().all(|r| r.sparkline.is_empty()));

        match check_connectivity(&reports, 0.5) {
            Err(DiagnosticError::EmptySeries { node, .. }) => assert_eq!(node, "Collator2000-01"),
            other => panic!("expected empty series failure, got {:?}", other),
        }
    }

    #[test]
    fn test_reports_written_to_disk() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "Collator2000-01.log",
            &(discovery_line("Orchestrator", "/ip4/127.0.0.1/tcp/30333")
                + &idle_lines("Container-2000", &[2, 3, 2])),
        );

        let scan = analysis::scan_ports(dir.path(), "log", &[]).unwrap();
        let targets = vec![PeerTarget::in_dir(dir.path(), "Collator2000-01", "log")];
        let connectivity = collect_connectivity(&targets, "Container-2000", fast_policy(), 120);

        let cluster = ClusterReport {
            metadata: report::ReportMetadata::now(dir.path()),
            ports: Some(scan),
            connectivity,
            isolation_threshold: 0.5,
        };

        let out = TempDir::new().unwrap();
        let json_path = out.path().join("report.json");
        let text_path = out.path().join("report.txt");
        analysis::generate_json_report(&cluster, &json_path).unwrap();
        analysis::generate_text_report(&cluster, &text_path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(json["connectivity"][0]["node"], "Collator2000-01");
        assert_eq!(json["connectivity"][0]["samples"], 3);

        let text = fs::read_to_string(&text_path).unwrap();
        assert!(text.contains("30333"));
        assert!(text.contains("[Collator2000-01] OK"));
    }

    #[test]
    fn test_log_assertions_over_file() {
        let dir = TempDir::new().unwrap();
        let content = "booting\nAssigned to container 2000\nsyncing\nPrepared block for proposing\n";
        write(dir.path(), "Collator2000-01.log", content);

        let text = fs::read_to_string(dir.path().join("Collator2000-01.log")).unwrap();
        assert!(analysis::check_logs_in_order(
            &text,
            &["Assigned to container 2000", "Prepared block for proposing"]
        )
        .is_ok());
        assert!(analysis::check_logs_in_order(
            &text,
            &["Prepared block for proposing", "Assigned to container 2000"]
        )
        .is_err());
        assert!(analysis::check_logs_absent(&text, &["panicked at"]).is_ok());
        assert!(matches!(
            analysis::check_logs_absent(&text, &["syncing"]),
            Err(DiagnosticError::ForbiddenLog { line: 3, .. })
        ));
    }

    /// Two processes listening on 30333 over a fake procfs tree
    #[cfg(unix)]
    #[test]
    fn test_listener_conflict_over_proc_tree() {
        use std::os::unix::fs::symlink;
        use zombie_diag::analysis::{check_listener_conflicts, listening_sockets, ProcFs, ProcessSelection};

        let proc_dir = TempDir::new().unwrap();
        let root = proc_dir.path();
        fs::create_dir_all(root.join("net")).unwrap();
        write(
            &root.join("net"),
            "tcp",
            "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n\
   0: 00000000:767D 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 501 1 0000000000000000 100 0 0 10 0\n\
   1: 00000000:767D 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 502 1 0000000000000000 100 0 0 10 0\n",
        );
        for (pid, name, inode) in [(10, "tanssi-node", 501), (20, "polkadot", 502)] {
            let fd_dir = root.join(pid.to_string()).join("fd");
            fs::create_dir_all(&fd_dir).unwrap();
            write(&root.join(pid.to_string()), "comm", &format!("{}\n", name));
            symlink(format!("socket:[{}]", inode), fd_dir.join("3")).unwrap();
        }

        let proc_fs = ProcFs::new(root);
        let found = listening_sockets(&proc_fs, false, &ProcessSelection::All).unwrap();
        assert_eq!(found.len(), 2);

        let report = check_listener_conflicts(&found);
        assert_eq!(report.len(), 1);
        assert_eq!(report.collisions[0].port, 30333);
        assert_eq!(report.collisions[0].scope, CollisionScope::InterProcess);
        let message = report.ensure_clean().unwrap_err().to_string();
        assert!(message.contains("tanssi-node"));
        assert!(message.contains("polkadot"));

        let only_one = ProcessSelection::resolve(&proc_fs, &[], &["polkadot".to_string()]).unwrap();
        let found = listening_sockets(&proc_fs, false, &only_one).unwrap();
        assert!(check_listener_conflicts(&found).is_clean());
    }
}
