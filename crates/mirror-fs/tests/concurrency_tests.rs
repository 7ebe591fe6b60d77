//! Concurrent access tests for write_atomic
//!
//! Verifies that temp-file-then-rename never exposes interleaved or partial
//! content to readers.

use mirror_fs::io::{self, WriteOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

#[test]
fn test_concurrent_writes_no_corruption() {
    let dir = tempdir().unwrap();
    let file_path = Arc::new(dir.path().join("concurrent.txt"));

    let num_threads = 10;
    let writes_per_thread = 20;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let path = Arc::clone(&file_path);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait();

                for i in 0..writes_per_thread {
                    let content = format!("thread{}:write{}\n", thread_id, i);
                    io::write_atomic(&path, content.as_bytes(), WriteOptions { fsync: false })
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread should not panic");
    }

    let content = std::fs::read_to_string(file_path.as_ref()).unwrap();
    assert!(
        content.starts_with("thread"),
        "Content should start with 'thread', got: {}",
        &content[..content.len().min(50)]
    );
    assert!(
        content.matches("thread").count() == 1,
        "Content should have exactly one 'thread' (no interleaving)"
    );
}

#[test]
fn test_reader_never_sees_partial_content() {
    let dir = tempdir().unwrap();
    let file_path = Arc::new(dir.path().join("watched.txt"));
    let small = vec![b'a'; 16];
    let large = vec![b'b'; 256 * 1024];
    io::write_atomic(&file_path, &small, WriteOptions { fsync: false }).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let path = Arc::clone(&file_path);
        let done = Arc::clone(&done);
        let (small, large) = (small.clone(), large.clone());
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                let seen = std::fs::read(path.as_ref()).unwrap();
                assert!(seen == small || seen == large, "observed {} bytes", seen.len());
            }
        })
    };

    for i in 0..50 {
        let payload = if i % 2 == 0 { &large } else { &small };
        io::write_atomic(&file_path, payload, WriteOptions { fsync: false }).unwrap();
    }
    done.store(true, Ordering::Relaxed);

    reader.join().expect("Reader should not observe partial writes");
}

#[test]
fn test_concurrent_writes_to_different_files_all_succeed() {
    let dir = tempdir().unwrap();
    let num_threads = 5;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let dir_path = dir.path().to_path_buf();
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait();
                let file_path = dir_path.join("shared").join(format!("file_{}.txt", thread_id));
                io::write_atomic(
                    &file_path,
                    format!("content_{}", thread_id).as_bytes(),
                    WriteOptions::default(),
                )
                .is_ok()
            })
        })
        .collect();

    for (thread_id, handle) in handles.into_iter().enumerate() {
        let success = handle.join().expect("Thread should not panic");
        assert!(success, "Write from thread {} should succeed", thread_id);
    }
}
