//! # smallheap - A Small-Heap Memory Allocator Library
//!
//! This crate provides a compact **first-fit heap manager** in Rust that
//! carves allocations out of a single caller-supplied byte region, for
//! environments without an operating-system heap (or where one is
//! deliberately avoided).
//!
//! ## Overview
//!
//! The caller hands over one contiguous region; the allocator places all of
//! its bookkeeping inside it and serves aligned allocations from the rest:
//!
//! ```text
//!   Small Heap Concept:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                       CALLER'S REGION                                │
//!   │                                                                      │
//!   │   ┌──────────┬──────┬──────┬──────┬──────────────────────┬───────┐   │
//!   │   │ HeapDesc │ A1   │ A2   │ free │          A3          │ TERM  │   │
//!   │   └──────────┴──────┴──────┴──────┴──────────────────────┴───────┘   │
//!   │        ▲                      ▲                              ▲       │
//!   │        │                      │                              │       │
//!   │   bookkeeping at        lowest-free hint              terminal       │
//!   │   the low end           (first-fit start)             sentinel       │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Every block is prefixed with a three-word header; freed blocks merge
//!   eagerly with free neighbors, so no two adjacent free blocks exist.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   smallheap
//!   ├── align      - Alignment macros (align!, align_down!)
//!   ├── item       - Block header and tagged-owner encoding (internal)
//!   └── heap       - SmallHeap: init / alloc / realloc / free
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use smallheap::SmallHeap;
//!
//! #[repr(align(8))]
//! struct Backing([u8; 1024]);
//!
//! let mut backing = Backing([0; 1024]);
//!
//! unsafe {
//!     let heap = SmallHeap::init(backing.0.as_mut_ptr(), 1024).unwrap();
//!
//!     // Allocate, use, resize, release.
//!     let ptr = heap.alloc(64);
//!     assert!(!ptr.is_null());
//!     ptr.write_bytes(0x42, 64);
//!
//!     let ptr = heap.realloc(ptr, 32);
//!
//!     // No heap handle needed: the block knows its owner.
//!     SmallHeap::free(ptr);
//! }
//! ```
//!
//! ## How It Works
//!
//! Each block header packs the owning heap's address and the used/free
//! status into a single word, and threads the blocks into a doubly linked,
//! address-ordered chain of byte offsets:
//!
//! ```text
//!   Single Block:
//!   ┌────────────────────────┬────────────────────────────────┐
//!   │     Block Header       │         User Payload           │
//!   │  ┌──────────────────┐  │                                │
//!   │  │ pool: owner|bit  │  │  ┌──────────────────────────┐  │
//!   │  │ next: offset     │  │  │     aligned, ≥ minimum   │  │
//!   │  │ prev: offset     │  │  │                          │  │
//!   │  └──────────────────┘  │  └──────────────────────────┘  │
//!   │      3 words           │                                │
//!   └────────────────────────┴────────────────────────────────┘
//!                            ▲
//!                            └── Pointer returned to user
//! ```
//!
//! Allocation scans the chain first-fit from a cached lowest-free hint and
//! splits loose fits; deallocation merges with free neighbors immediately.
//! Reallocation shrinks in place when the cut-off tail is worth a block and
//! otherwise moves the payload to a fresh allocation.
//!
//! ## Features
//!
//! - **Self-contained**: descriptor, headers and payloads all live in the
//!   caller's region; no global state, no OS calls
//! - **Introspectable**: per-heap used/peak/total counters via `stats()`
//! - **Handle-free release**: `free` recovers the owning heap from the
//!   block header's tag word
//! - **Trace logging**: operations log through the `log` facade
//!
//! ## Limitations
//!
//! - **Single-threaded only**: callers must serialize all operations on a
//!   heap themselves
//! - **First-fit only**: no best-fit or segregated size classes; a
//!   lowest-free hint amortizes the scan
//! - **No grow-in-place**: growing reallocation always moves the payload
//! - **O(n) allocation**: free blocks are not threaded separately
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! All allocation and deallocation operations require `unsafe` blocks, and
//! the caller is responsible for keeping the backing region alive and
//! untouched while the heap is in use.

pub mod align;
mod heap;
mod item;

pub use heap::{ALIGN_SIZE, HeapStats, SmallHeap};
