use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bolt_runtime::{Batch, BatchHandler, BatcherConfig, DebouncedBatcher};

#[derive(Default)]
struct Recorder {
    batches: Mutex<Vec<Batch>>,
}

impl Recorder {
    fn batches(&self) -> Vec<Batch> {
        self.batches.lock().expect("lock").clone()
    }
}

#[async_trait]
impl BatchHandler for Recorder {
    async fn handle(&self, batch: Batch) -> anyhow::Result<()> {
        self.batches.lock().expect("lock").push(batch);
        Ok(())
    }
}

fn batcher(recorder: &Arc<Recorder>) -> DebouncedBatcher {
    DebouncedBatcher::new(BatcherConfig::default(), recorder.clone())
}

#[tokio::test(start_paused = true)]
async fn additions_within_the_delay_share_one_batch() {
    let recorder = Arc::new(Recorder::default());
    let batcher = batcher(&recorder);

    batcher.add_file("/src/App.jsx", "export default 1;\n");
    tokio::time::sleep(Duration::from_millis(60)).await;
    batcher.add_command("npm run dev");
    tokio::time::sleep(Duration::from_millis(150)).await;

    let batches = recorder.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].files.len(), 1);
    assert_eq!(batches[0].commands, ["npm run dev"]);
}

#[tokio::test(start_paused = true)]
async fn quiet_period_separates_batches() {
    let recorder = Arc::new(Recorder::default());
    let batcher = batcher(&recorder);

    batcher.add_file("/a.txt", "a");
    tokio::time::sleep(Duration::from_millis(150)).await;
    batcher.add_file("/b.txt", "b");
    tokio::time::sleep(Duration::from_millis(150)).await;

    let batches = recorder.batches();
    assert_eq!(batches.len(), 2);
    assert_ne!(batches[0].id, batches[1].id);
    assert!(batches[0].files.contains_key("/a.txt"));
    assert!(batches[1].files.contains_key("/b.txt"));
}

#[tokio::test(start_paused = true)]
async fn manual_flush_racing_the_timer_yields_one_batch() {
    let recorder = Arc::new(Recorder::default());
    let batcher = batcher(&recorder);

    batcher.add_file("/a.txt", "a");
    tokio::time::sleep(Duration::from_millis(99)).await;
    let id = batcher.flush().await.expect("something to flush");
    tokio::time::sleep(Duration::from_millis(500)).await;

    let batches = recorder.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].id, id);
    assert_eq!(batcher.stats().flushed, 1);
}

#[tokio::test(start_paused = true)]
async fn additions_during_a_flush_start_a_new_batch() {
    struct Slow {
        inner: Arc<Recorder>,
        batcher: Mutex<Option<DebouncedBatcher>>,
    }

    #[async_trait]
    impl BatchHandler for Slow {
        async fn handle(&self, batch: Batch) -> anyhow::Result<()> {
            let first = self.inner.batches().is_empty();
            self.inner.handle(batch).await?;
            if first {
                let batcher = self.batcher.lock().expect("lock").clone();
                if let Some(batcher) = batcher {
                    batcher.add_file("/late.txt", "late");
                }
            }
            Ok(())
        }
    }

    let recorder = Arc::new(Recorder::default());
    let slow = Arc::new(Slow {
        inner: recorder.clone(),
        batcher: Mutex::new(None),
    });
    let batcher = DebouncedBatcher::new(BatcherConfig::default(), slow.clone());
    *slow.batcher.lock().expect("lock") = Some(batcher.clone());

    batcher.add_file("/early.txt", "early");
    batcher.flush().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let batches = recorder.batches();
    assert_eq!(batches.len(), 2);
    assert!(batches[0].files.contains_key("/early.txt"));
    assert!(batches[1].files.contains_key("/late.txt"));
}
