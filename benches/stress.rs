//! Allocator churn benchmarks.
//!
//! Measures steady-state costs of the first-fit engine:
//! - alloc/free churn with mixed block sizes
//! - realloc churn over a fixed slot table

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use smallheap::SmallHeap;

const REGION_SIZE: usize = 16 * 1024;

#[repr(align(8))]
struct Region([u8; REGION_SIZE]);

fn bench_alloc_free_churn(c: &mut Criterion) {
  c.bench_function("alloc_free_churn", |b| {
    let mut region = Box::new(Region([0; REGION_SIZE]));
    let heap =
      unsafe { SmallHeap::init(region.0.as_mut_ptr(), REGION_SIZE) }.unwrap();
    let rng = fastrand::Rng::with_seed(0x51ab_5eed);

    b.iter(|| unsafe {
      let mut live: Vec<*mut u8> = Vec::with_capacity(64);

      for _ in 0..256 {
        if live.is_empty() || rng.u8(..10) >= 4 {
          let ptr = heap.alloc(rng.usize(16..256));
          if ptr.is_null() {
            while let Some(ptr) = live.pop() {
              SmallHeap::free(ptr);
            }
          } else {
            live.push(ptr);
          }
        } else {
          SmallHeap::free(live.swap_remove(rng.usize(..live.len())));
        }
      }

      while let Some(ptr) = live.pop() {
        SmallHeap::free(ptr);
      }

      black_box(heap.stats().used)
    });
  });
}

fn bench_realloc_churn(c: &mut Criterion) {
  c.bench_function("realloc_churn", |b| {
    let mut region = Box::new(Region([0; REGION_SIZE]));
    let heap =
      unsafe { SmallHeap::init(region.0.as_mut_ptr(), REGION_SIZE) }.unwrap();
    let rng = fastrand::Rng::with_seed(0x5eed_51ab);

    b.iter(|| unsafe {
      let mut slots: Vec<*mut u8> = vec![std::ptr::null_mut(); 16];

      for _ in 0..256 {
        let idx = rng.usize(..slots.len());
        let newsize = rng.usize(0..=192);

        let ptr = heap.realloc(slots[idx], newsize);
        if ptr.is_null() {
          // Freed (newsize == 0) or exhausted with the old block intact.
          if newsize == 0 {
            slots[idx] = std::ptr::null_mut();
          }
        } else {
          slots[idx] = ptr;
        }
      }

      for slot in slots.drain(..) {
        SmallHeap::free(slot);
      }

      black_box(heap.stats().used)
    });
  });
}

criterion_group!(benches, bench_alloc_free_churn, bench_realloc_churn);
criterion_main!(benches);
