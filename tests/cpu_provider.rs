use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use postinit::oracle::cpu::label_digest;
use postinit::{
    cpu_provider_id, providers, CancelToken, InitOpts, Initializer, PostConfig, ProviderKind,
    Status, CPU_PROVIDER_ID,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("postinit-cpu-{prefix}-{pid}-{t}-{id}"))
}

fn read_all(root: &PathBuf, files: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for i in 0..files {
        out.extend(fs::read(root.join(format!("postdata_{i}.bin")))?);
    }
    Ok(out)
}

fn run(prefix: &str, cfg: PostConfig, units: u32, files: u32) -> Result<(PathBuf, Vec<u8>)> {
    let root = unique_root(prefix);
    let opts = InitOpts::builder(&root).num_units(units).num_files(files).build();
    let init = Initializer::new(&[0x5a; 32], cfg, opts)?;
    assert_eq!(init.provider().id, CPU_PROVIDER_ID);
    init.initialize(&CancelToken::new())?;
    assert_eq!(init.status(), Status::Completed);
    let data = read_all(&root, files)?;
    Ok((root, data))
}

#[test]
fn cpu_is_listed_and_default() {
    let list = providers();
    assert!(!list.is_empty());
    assert_eq!(cpu_provider_id(), Some(CPU_PROVIDER_ID));
    let cpu = list.iter().find(|p| p.id == CPU_PROVIDER_ID).unwrap();
    assert_eq!(cpu.kind, ProviderKind::Cpu);
}

#[test]
fn byte_labels_match_digest() -> Result<()> {
    let cfg = PostConfig::default()
        .with_bits_per_label(8)
        .with_labels_per_unit(64)
        .with_compute_batch_size(16);
    let (root, data) = run("digest", cfg, 2, 1)?;

    let expected: Vec<u8> = (0..128u64).map(|p| label_digest(&[0x5a; 32], p)[0]).collect();
    assert_eq!(data, expected);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn output_does_not_depend_on_batching_or_sharding() -> Result<()> {
    for bits in [1u32, 4, 8, 12, 64] {
        let base = PostConfig::default()
            .with_bits_per_label(bits)
            .with_labels_per_unit(64);

        let (r1, one_batch) = run("whole", base.clone().with_compute_batch_size(128), 2, 1)?;
        let (r2, small_batches) = run("batched", base.clone().with_compute_batch_size(16), 2, 1)?;
        let (r3, sharded) = run("sharded", base.with_compute_batch_size(8), 2, 4)?;

        assert_eq!(one_batch.len() as u64, (128 * bits as u64).div_ceil(8), "bits {bits}");
        assert_eq!(one_batch, small_batches, "bits {bits}");
        assert_eq!(one_batch, sharded, "bits {bits}");

        for r in [r1, r2, r3] {
            let _ = fs::remove_dir_all(&r);
        }
    }
    Ok(())
}
