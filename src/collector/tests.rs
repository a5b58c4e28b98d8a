#[cfg(test)]
mod tests {
    use crate::collector::{
        percent_running, AggregateSnapshot, Classification, CollectionDriver, LifecycleState, MetricsAggregator,
        StatusEmitter, StatusEntry, StopHandle,
    };
    use crate::error::{ObserverError, Result};
    use crate::exporter::PublishedGauges;
    use crate::services::{MockServiceRegistry, ServiceLookup, ServiceRecord, ServiceRegistry, StatusReader};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct RecordingEmitter(Arc<Mutex<Vec<StatusEntry>>>);

    impl StatusEmitter for RecordingEmitter {
        fn emit(&self, entry: &StatusEntry) {
            self.0.lock().unwrap().push(entry.clone());
        }
    }

    impl RecordingEmitter {
        fn entries(&self) -> Vec<StatusEntry> {
            self.0.lock().unwrap().clone()
        }
    }

    fn record(name: &str, status: &str) -> ServiceRecord {
        ServiceRecord {
            name: name.to_string(),
            display_name: format!("{} display", name),
            binpath: format!(r"C:\Program Files\{}\{}.exe", name, name),
            username: "LocalSystem".to_string(),
            start_type: "automatic".to_string(),
            status: status.to_string(),
            pid: if status == "running" { Some(4242) } else { None },
            description: format!("{} description", name),
        }
    }

    /// svcA running, svcB stopped, anything else unknown
    fn scenario_registry() -> MockServiceRegistry {
        let mut registry = MockServiceRegistry::new();
        registry.expect_query().returning(|name| match name {
            "svcA" => Ok(record(name, "running")),
            "svcB" => Ok(record(name, "stopped")),
            other => Err(ObserverError::ServiceLookup {
                service: other.to_string(),
                message: "The specified service does not exist as an installed service.".to_string(),
            }
            .into()),
        });
        registry
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| name.to_string()).collect()
    }

    fn aggregator(registry: impl ServiceRegistry + 'static, emitter: &RecordingEmitter) -> MetricsAggregator {
        MetricsAggregator::new(StatusReader::new(Box::new(registry)), Box::new(emitter.clone()))
    }

    #[test]
    fn test_mixed_scenario() -> Result<()> {
        let emitter = RecordingEmitter::default();
        let aggregator = aggregator(scenario_registry(), &emitter);

        let snapshot = aggregator.aggregate(&names(&["svcA", "svcB", "svcC"]))?;
        assert_eq!(
            snapshot,
            AggregateSnapshot {
                total: 3,
                running: 1,
                not_running: 2,
                not_found: 1,
                percent_running: 33,
            }
        );

        let entries = emitter.entries();
        assert_eq!(entries.len(), 3);
        let order: Vec<&str> = entries.iter().map(|e| e.service.as_str()).collect();
        assert_eq!(order, vec!["svcA", "svcB", "svcC"]);

        let levels: Vec<tracing::Level> = entries.iter().map(|e| e.level()).collect();
        assert_eq!(levels, vec![tracing::Level::INFO, tracing::Level::WARN, tracing::Level::WARN]);

        assert_eq!(
            entries[0].payload,
            r"svcA | svcA display | C:\Program Files\svcA\svcA.exe | LocalSystem | automatic | running | 4242 | svcA description"
        );
        assert_eq!(
            entries[1].payload,
            r"svcB | svcB display | C:\Program Files\svcB\svcB.exe | LocalSystem | automatic | stopped |  | svcB description"
        );
        assert!(entries[2].payload.starts_with("svcC | not found: "));
        Ok(())
    }

    #[test]
    fn test_empty_set_fails() {
        let emitter = RecordingEmitter::default();
        let mut registry = MockServiceRegistry::new();
        registry.expect_query().never();

        let err = aggregator(registry, &emitter).aggregate(&[]).unwrap_err();
        assert!(matches!(err.downcast_ref::<ObserverError>(), Some(ObserverError::EmptyMonitoredSet)));
        assert!(emitter.entries().is_empty());
    }

    #[test]
    fn test_not_found_always_warns_once() -> Result<()> {
        let emitter = RecordingEmitter::default();
        let mut registry = MockServiceRegistry::new();
        registry
            .expect_query()
            .times(4)
            .returning(|_| Err(anyhow::anyhow!("Access is denied.")));

        let snapshot = aggregator(registry, &emitter).aggregate(&names(&["a", "b", "c", "d"]))?;
        assert_eq!(snapshot.running, 0);
        assert_eq!(snapshot.not_running, 4);
        assert_eq!(snapshot.not_found, 4);
        assert_eq!(snapshot.percent_running, 0);

        let entries = emitter.entries();
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|e| e.level() == tracing::Level::WARN));
        assert!(entries.iter().all(|e| e.classification == Classification::NotFound));
        Ok(())
    }

    #[test]
    fn test_status_match_is_exact() -> Result<()> {
        let emitter = RecordingEmitter::default();
        let mut registry = MockServiceRegistry::new();
        registry.expect_query().returning(|name| Ok(record(name, name)));

        let statuses = ["running", "Running", "paused", "start_pending", "stopped"];
        let snapshot = aggregator(registry, &emitter).aggregate(&names(&statuses))?;

        assert_eq!(snapshot.running, 1);
        assert_eq!(snapshot.not_running, 4);
        assert_eq!(snapshot.not_found, 0);
        assert_eq!(snapshot.percent_running, 20);

        let info_count = emitter
            .entries()
            .iter()
            .filter(|e| e.level() == tracing::Level::INFO)
            .count();
        assert_eq!(info_count, 1);
        Ok(())
    }

    #[test]
    fn test_classification_of_lookup() {
        assert_eq!(
            Classification::of(&ServiceLookup::Found(record("x", "running"))),
            Classification::Running
        );
        assert_eq!(
            Classification::of(&ServiceLookup::Found(record("x", "stopped"))),
            Classification::Stopped
        );
        assert_eq!(
            Classification::of(&ServiceLookup::NotFound {
                reason: String::new()
            }),
            Classification::NotFound
        );
    }

    #[test]
    fn test_multiline_description_stays_on_one_line() {
        let mut rec = record("svc", "running");
        rec.description = "first line\r\n  second line\n".to_string();

        let entry = StatusEntry::new("svc", &ServiceLookup::Found(rec), Classification::Running);
        assert!(entry.payload.ends_with("| first line second line"));
        assert!(!entry.payload.contains('\n'));
    }

    #[test]
    fn test_percent_running_rounding() {
        assert_eq!(percent_running(1, 3), 33);
        assert_eq!(percent_running(2, 3), 67);
        assert_eq!(percent_running(0, 5), 0);
        assert_eq!(percent_running(5, 5), 100);
        assert_eq!(percent_running(1, 2), 50);
        // Exact ties at the hundredth go to the even neighbour
        assert_eq!(percent_running(1, 8), 12);
        assert_eq!(percent_running(3, 8), 38);
        assert_eq!(percent_running(5, 8), 62);
        assert_eq!(percent_running(7, 8), 88);
        assert_eq!(percent_running(1, 200), 0);
        assert_eq!(percent_running(3, 200), 2);
        assert_eq!(percent_running(0, 0), 0);
    }

    #[test]
    fn test_snapshot_invariants() -> Result<()> {
        for total in 1..=60u64 {
            for running in 0..=total {
                let classifications = (0..total).map(|i| {
                    if i < running {
                        Classification::Running
                    } else if i % 2 == 0 {
                        Classification::Stopped
                    } else {
                        Classification::NotFound
                    }
                });
                let snapshot = AggregateSnapshot::from_classifications(classifications)?;

                assert_eq!(snapshot.total, total);
                assert_eq!(snapshot.running + snapshot.not_running, total);
                assert!(snapshot.not_found <= snapshot.not_running);
                assert!(snapshot.percent_running <= 100);
                assert_eq!(snapshot.percent_running, percent_running(running, total));
            }
        }
        Ok(())
    }

    #[test]
    fn test_summary_lists_totals() {
        let snapshot = AggregateSnapshot {
            total: 3,
            running: 1,
            not_running: 2,
            not_found: 1,
            percent_running: 33,
        };
        let summary = snapshot.summary();
        assert!(summary.contains("Total Number of Monitored Services: 3"));
        assert!(summary.contains("Total Number of Running Services: 1"));
        assert!(summary.contains("Total Number of NOT Running Services: 2"));
        assert!(summary.contains("Percent of Running Services: 33 %"));
    }

    fn driver(
        registry: impl ServiceRegistry + 'static,
        services: &[&str],
        interval: Duration,
    ) -> Result<(Arc<CollectionDriver>, Arc<PublishedGauges>)> {
        let gauges = Arc::new(PublishedGauges::new()?);
        let driver = CollectionDriver::new(
            aggregator(registry, &RecordingEmitter::default()),
            names(services),
            Arc::clone(&gauges),
            interval,
        )?;
        Ok((Arc::new(driver), gauges))
    }

    async fn wait_for_cycles(gauges: &PublishedGauges, cycles: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while gauges.cycles() < cycles {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("driver did not complete the expected passes");
    }

    #[test]
    fn test_driver_rejects_empty_set() -> Result<()> {
        let gauges = Arc::new(PublishedGauges::new()?);
        let result = CollectionDriver::new(
            aggregator(MockServiceRegistry::new(), &RecordingEmitter::default()),
            vec![],
            gauges,
            Duration::from_secs(5),
        );
        let err = result.err().expect("empty set must be rejected");
        assert!(matches!(err.downcast_ref::<ObserverError>(), Some(ObserverError::EmptyMonitoredSet)));
        Ok(())
    }

    #[tokio::test]
    async fn test_run_cycle_publishes_gauges() -> Result<()> {
        let (driver, gauges) = driver(scenario_registry(), &["svcA", "svcB", "svcC"], Duration::from_secs(5))?;

        let snapshot = driver.run_cycle().await?;
        assert_eq!(snapshot.percent_running, 33);
        assert_eq!(gauges.values(), (3, 1, 2, 33));
        assert_eq!(gauges.cycles(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_before_run_skips_all_passes() -> Result<()> {
        let mut registry = MockServiceRegistry::new();
        registry.expect_query().never();
        let (driver, gauges) = driver(registry, &["svcA"], Duration::from_secs(5))?;

        assert_eq!(driver.state(), LifecycleState::NotStarted);
        driver.stop();
        driver.run().await?;

        assert_eq!(driver.state(), LifecycleState::Stopped);
        assert_eq!(gauges.cycles(), 0);
        assert_eq!(gauges.values(), (0, 0, 0, 0));
        Ok(())
    }

    #[tokio::test]
    async fn test_external_stop_handle_controls_driver() -> Result<()> {
        let mut registry = MockServiceRegistry::new();
        registry.expect_query().never();

        let stop = StopHandle::new();
        let gauges = Arc::new(PublishedGauges::new()?);
        let driver = CollectionDriver::with_stop_handle(
            aggregator(registry, &RecordingEmitter::default()),
            names(&["svcA"]),
            Arc::clone(&gauges),
            Duration::from_secs(5),
            stop.clone(),
        )?;

        stop.stop();
        assert!(driver.stop_handle().is_stop_requested());
        driver.run().await?;

        assert_eq!(driver.state(), LifecycleState::Stopped);
        assert_eq!(gauges.cycles(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_run_twice_fails() -> Result<()> {
        let (driver, _gauges) = driver(scenario_registry(), &["svcA"], Duration::from_secs(5))?;
        driver.stop();
        driver.run().await?;

        let err = driver.run().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ObserverError>(), Some(ObserverError::AlreadyStarted)));
        Ok(())
    }

    #[tokio::test]
    async fn test_driver_repeats_on_interval() -> Result<()> {
        let (driver, gauges) = driver(scenario_registry(), &["svcA", "svcB"], Duration::from_millis(10))?;

        let running = Arc::clone(&driver);
        let task = tokio::spawn(async move { running.run().await });

        wait_for_cycles(&gauges, 3).await;
        assert_eq!(driver.state(), LifecycleState::Running);

        driver.stop();
        tokio::time::timeout(Duration::from_secs(5), task).await???;
        assert_eq!(driver.state(), LifecycleState::Stopped);
        assert_eq!(gauges.values(), (2, 1, 1, 50));
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_during_wait_ends_without_another_pass() -> Result<()> {
        let (driver, gauges) = driver(scenario_registry(), &["svcA"], Duration::from_secs(3600))?;

        let running = Arc::clone(&driver);
        let task = tokio::spawn(async move { running.run().await });

        wait_for_cycles(&gauges, 1).await;
        driver.stop();

        tokio::time::timeout(Duration::from_secs(5), task).await???;
        assert_eq!(gauges.cycles(), 1);
        assert_eq!(driver.state(), LifecycleState::Stopped);
        Ok(())
    }

    /// Blocks the first query until released
    struct GatedRegistry {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl ServiceRegistry for GatedRegistry {
        fn query(&self, name: &str) -> Result<ServiceRecord> {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv_timeout(Duration::from_secs(5));
            Ok(record(name, "running"))
        }
    }

    #[tokio::test]
    async fn test_stop_during_pass_completes_and_publishes() -> Result<()> {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let registry = GatedRegistry {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        let (driver, gauges) = driver(registry, &["svcA"], Duration::from_secs(3600))?;

        let running = Arc::clone(&driver);
        let task = tokio::spawn(async move { running.run().await });

        tokio::task::spawn_blocking(move || entered_rx.recv_timeout(Duration::from_secs(5))).await??;
        driver.stop();
        assert_eq!(gauges.cycles(), 0);
        release_tx.send(())?;

        tokio::time::timeout(Duration::from_secs(5), task).await???;
        assert_eq!(gauges.cycles(), 1);
        assert_eq!(gauges.values(), (1, 1, 0, 100));
        assert_eq!(driver.state(), LifecycleState::Stopped);
        Ok(())
    }
}
