use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;

use postinit::oracle::{ComputeProvider, ProviderKind, ProviderRegistry, WorkOutput, WorkRequest};
use postinit::{CancelToken, InitError, InitOpts, Initializer, PostConfig, Status};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("postinit-excl-{prefix}-{pid}-{t}-{id}"))
}

const GATED_ID: u32 = 11;

/// Announces every compute call on `entered`, then blocks until `release`
/// delivers a permit.
struct GatedOracle {
    entered: Mutex<Sender<u64>>,
    release: Mutex<Receiver<()>>,
}

impl ComputeProvider for GatedOracle {
    fn id(&self) -> u32 {
        GATED_ID
    }
    fn model(&self) -> &str {
        "gated stub"
    }
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gpu
    }
    fn compute(&self, req: &WorkRequest<'_>) -> postinit::Result<WorkOutput> {
        let _ = self.entered.lock().unwrap().send(req.start);
        self.release
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(30))
            .map_err(|e| postinit::InitError::Oracle(e.to_string()))?;
        Ok(WorkOutput {
            output: (req.start..=req.end).map(|p| p as u8).collect(),
            nonce: None,
        })
    }
    fn stop(&self) -> postinit::Result<()> {
        Ok(())
    }
}

fn gated(root: &PathBuf) -> Result<(Initializer, Receiver<u64>, Sender<()>)> {
    let (entered_tx, entered_rx) = channel();
    let (release_tx, release_rx) = channel();
    let mut reg = ProviderRegistry::empty();
    reg.register(Arc::new(GatedOracle {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    }));
    let cfg = PostConfig::default()
        .with_bits_per_label(8)
        .with_labels_per_unit(8)
        .with_compute_batch_size(4);
    let opts = InitOpts::builder(root)
        .num_units(1)
        .num_files(1)
        .provider_id(Some(GATED_ID))
        .build();
    let init = Initializer::with_registry(&[0xaa; 32], cfg, opts, &reg)?;
    Ok((init, entered_rx, release_tx))
}

#[test]
fn second_caller_fails_fast_while_initializing() -> Result<()> {
    let root = unique_root("busy");
    let (init, entered, release) = gated(&root)?;

    thread::scope(|s| -> Result<()> {
        let worker = s.spawn(|| init.initialize(&CancelToken::new()));

        // первый батч в работе -> токен занят
        assert_eq!(entered.recv_timeout(Duration::from_secs(30))?, 0);

        assert_eq!(init.status(), Status::Initializing);
        assert!(matches!(
            init.initialize(&CancelToken::new()),
            Err(InitError::AlreadyInitializing)
        ));
        assert!(matches!(init.reset(), Err(InitError::CannotResetWhileInitializing)));

        release.send(())?;
        assert_eq!(entered.recv_timeout(Duration::from_secs(30))?, 4);
        // второй батч запрошен -> первый уже записан
        assert_eq!(init.session_progress(), 4);
        release.send(())?;

        match worker.join() {
            Ok(res) => res?,
            Err(_) => anyhow::bail!("initialize thread panicked"),
        }
        Ok(())
    })?;

    // token released on success
    assert_eq!(init.status(), Status::Completed);
    init.reset()?;
    assert_eq!(init.status(), Status::NotStarted);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn token_is_released_after_cancellation() -> Result<()> {
    let root = unique_root("cancel-release");
    let (init, entered, release) = gated(&root)?;
    let cancel = CancelToken::new();

    thread::scope(|s| -> Result<()> {
        let worker = s.spawn(|| init.initialize(&cancel));
        entered.recv_timeout(Duration::from_secs(30))?;
        cancel.cancel();
        release.send(())?;
        match worker.join() {
            Ok(res) => assert!(matches!(res, Err(InitError::Cancelled))),
            Err(_) => anyhow::bail!("initialize thread panicked"),
        }
        Ok(())
    })?;

    assert_eq!(init.status(), Status::Started);
    assert_eq!(fs::metadata(root.join("postdata_0.bin"))?.len(), 4);
    init.reset()?;

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn progress_is_observable_from_other_threads() -> Result<()> {
    let root = unique_root("progress");
    let (init, entered, release) = gated(&root)?;
    let init = Arc::new(init);

    let worker = {
        let init = Arc::clone(&init);
        thread::spawn(move || init.initialize(&CancelToken::new()))
    };
    let mut seen = Vec::new();
    for _ in 0..2 {
        entered.recv_timeout(Duration::from_secs(30))?;
        seen.push(init.session_progress());
        release.send(())?;
    }
    match worker.join() {
        Ok(res) => res?,
        Err(_) => anyhow::bail!("initialize thread panicked"),
    }
    seen.push(init.session_progress());
    assert_eq!(seen, vec![0, 4, 8]);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
