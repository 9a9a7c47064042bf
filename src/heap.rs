//! # Small Heap
//!
//! A compact first-fit heap manager that carves allocations out of a single
//! caller-supplied byte region. No operating-system heap is involved: the
//! caller hands over one contiguous region and the allocator places all of
//! its bookkeeping inside it.
//!
//! ## Region Layout
//!
//! The low end of the region holds the heap descriptor. The rest is the
//! **arena**, partitioned into blocks. Every block starts with a three-word
//! header ([`Item`]); a permanently-used, zero-payload **terminal sentinel**
//! closes the arena at the high end.
//!
//! ```text
//!   caller's region
//!   ┌──────────────┬──────────────────────────────────────────────────────┐
//!   │   HeapDesc   │                      ARENA                           │
//!   │ (bookkeeping)│                                                      │
//!   └──────────────┼────────┬─────────┬────────┬─────────┬───────┬───────┤
//!                  │ header │ payload │ header │ payload │  ...  │ header│
//!                  │ (used) │         │ (free) │         │       │ (TERM)│
//!                  └────────┴─────────┴────────┴─────────┴───────┴───────┘
//!                  ▲                                              ▲
//!                  │                                              │
//!              heap_ptr                                       heap_end
//! ```
//!
//! ## Block Chain
//!
//! Headers thread the blocks into a doubly linked list in strictly ascending
//! address order. The links are byte offsets from the arena start, not
//! pointers, so the chain is position-independent within the arena:
//!
//! ```text
//!   offset:   0                 next₀              next₁        S + H
//!   ┌──────────────────┐  ┌──────────────┐  ┌──────────────┐  ┌───────────┐
//!   │ pool: heap|USED  │  │ pool: heap|0 │  │ pool: heap|1 │  │ heap|USED │
//!   │ next: ───────────┼─►│ next: ───────┼─►│ next: ───────┼─►│ next: S+H │ (self)
//!   │ prev: 0 (self)   │◄─┼─prev         │◄─┼─prev         │◄─┼─prev      │
//!   └──────────────────┘  └──────────────┘  └──────────────┘  └───────────┘
//!                                                              terminal
//!   S = aligned arena size, H = aligned header size
//! ```
//!
//! Each header also carries the address of the owning heap descriptor with
//! the used/free status packed into its low bit, so [`SmallHeap::free`]
//! needs nothing but the payload pointer.
//!
//! ## Policy
//!
//! - **First fit** from a cached lowest-free hint, walking the address
//!   chain and filtering by status. Free blocks are not threaded separately;
//!   the hint amortizes the common case.
//! - **Split** a loose fit when the remainder can hold a header plus the
//!   minimum payload; otherwise hand out the whole block.
//! - **Eager coalescing** on free with both address neighbors, so no two
//!   adjacent free blocks ever persist.
//! - **Realloc** shrinks in place when the cut-off tail is worth a block,
//!   and otherwise moves to a fresh allocation, copying the payload.
//!
//! ## Thread Safety
//!
//! None. All operations assume exclusive access to the heap for their
//! duration; callers that share a heap across threads must wrap every
//! operation in their own mutual exclusion.

use std::{mem, ptr};

use log::{debug, error, trace};

use crate::{align, align_down, item::Item};

/// Alignment of every payload pointer handed out by the allocator, and of
/// all internal placement. One machine word.
pub const ALIGN_SIZE: usize = mem::size_of::<usize>();

/// Block header size, rounded up to [`ALIGN_SIZE`].
const SIZEOF_ITEM: usize = align!(mem::size_of::<Item>());

/// Smallest payload worth tracking as a block: room for two offsets and a
/// tag word, so a freed fragment can always be rethreaded as a header.
const MIN_SIZE: usize = mem::size_of::<usize>() + 2 * mem::size_of::<usize>();

/// [`MIN_SIZE`] rounded up to [`ALIGN_SIZE`]; requests below this are
/// promoted to it.
const MIN_SIZE_ALIGNED: usize = align!(MIN_SIZE);

/// Bookkeeping record placed at the low end of the managed region.
///
/// Lives inside the caller's region for its whole lifetime; never
/// explicitly destroyed.
#[repr(C)]
pub struct HeapDescriptor {
  /// Arena start address.
  address: usize,

  /// Arena bytes available to payloads plus their headers.
  total: usize,

  /// Bytes currently taken by allocated blocks, headers included.
  used: usize,

  /// High-water mark of `used`.
  max_used: usize,

  /// First byte of the arena; all header offsets are relative to this.
  heap_ptr: *mut u8,

  /// The terminal sentinel closing the arena.
  heap_end: *mut Item,

  /// Lowest free block, or the terminal sentinel when none is free.
  /// Starting point for the first-fit scan.
  lfree: *mut Item,

  /// Arena size aligned down to [`ALIGN_SIZE`]. Equals `total`.
  size_aligned: usize,
}

/// Point-in-time usage counters of a heap, as kept by its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  /// Arena start address.
  pub address: usize,

  /// Arena bytes managed (payloads plus headers).
  pub total: usize,

  /// Bytes currently allocated, headers included.
  pub used: usize,

  /// Peak value of `used` over the heap's lifetime.
  pub max_used: usize,
}

/// Handle to a heap placed over a caller-supplied region.
///
/// The handle is a plain pointer to the in-region descriptor; it is `Copy`
/// and does not borrow the region. Keeping the region alive and unaliased
/// for as long as the handle is used is the caller's obligation.
///
/// # Example
///
/// ```rust,ignore
/// let mut region = [0u8; 1024];
///
/// unsafe {
///     let heap = SmallHeap::init(region.as_mut_ptr(), region.len()).unwrap();
///
///     let p = heap.alloc(64);
///     assert!(!p.is_null());
///
///     SmallHeap::free(p);
/// }
/// ```
#[derive(Clone, Copy)]
pub struct SmallHeap {
  desc: *mut HeapDescriptor,
}

impl SmallHeap {
  /// Places a heap over the byte region `(begin, size)` and takes ownership
  /// of it.
  ///
  /// The descriptor is installed at the aligned low end of the region; the
  /// remainder becomes the arena, set up as one free block followed by the
  /// terminal sentinel:
  ///
  /// ```text
  ///   begin                                                begin + size
  ///   │ ┌──────────┬────────┬───────────────────────────┬──────────┐ │
  ///   └►│ HeapDesc │ header │     one free block        │ terminal │◄┘
  ///     │          │ (free) │   covering the arena      │  (used)  │
  ///     └──────────┴────────┴───────────────────────────┴──────────┘
  ///     ▲ aligned up                                      aligned down ▲
  /// ```
  ///
  /// # Returns
  ///
  /// A heap handle, or `None` when the region cannot accommodate the
  /// descriptor, two headers and any payload.
  ///
  /// # Safety
  ///
  /// `begin` must be valid for reads and writes of `size` bytes, and the
  /// region must not overlap any other live heap. After this call the
  /// region belongs to the allocator: the caller must not touch it except
  /// through payload pointers returned by [`alloc`](Self::alloc) and
  /// [`realloc`](Self::realloc), until the region itself is reclaimed.
  pub unsafe fn init(
    begin: *mut u8,
    size: usize,
  ) -> Option<SmallHeap> {
    let desc = align!(begin as usize) as *mut HeapDescriptor;
    let staaddr = desc as usize + mem::size_of::<HeapDescriptor>();
    let begin_align = align!(staaddr);
    let end_align = align_down!(begin as usize + size);

    // The region must fit the descriptor, both headers and something more.
    if end_align <= 2 * SIZEOF_ITEM || end_align - 2 * SIZEOF_ITEM < staaddr {
      error!(
        "heap init, error begin address {:#x}, and end address {:#x}",
        begin as usize,
        begin as usize + size
      );

      return None;
    }

    let mem_size = end_align - begin_align - 2 * SIZEOF_ITEM;

    unsafe {
      ptr::write(desc, HeapDescriptor {
        address: begin_align,
        total: mem_size,
        used: 0,
        max_used: 0,
        heap_ptr: begin_align as *mut u8,
        heap_end: ptr::null_mut(),
        lfree: ptr::null_mut(),
        size_aligned: mem_size,
      });

      let heap = SmallHeap { desc };

      // One free block spanning the whole arena.
      let item = heap.item_at(0);
      (*item).pool = Item::free_tag(desc as usize);
      (*item).next = mem_size + SIZEOF_ITEM;
      (*item).prev = 0;

      // Terminal sentinel: permanently used, offsets looping onto itself.
      // Its `prev` is patched by the first split.
      let end = heap.item_at(mem_size + SIZEOF_ITEM);
      (*end).pool = Item::used_tag(desc as usize);
      (*end).next = mem_size + SIZEOF_ITEM;
      (*end).prev = mem_size + SIZEOF_ITEM;
      (*desc).heap_end = end;

      // The scan hint starts at the only (and lowest) free block.
      (*desc).lfree = item;

      debug!(
        "heap init, arena begin address {:#x}, size {}",
        begin_align, mem_size
      );

      Some(heap)
    }
  }

  /// Allocates a block of at least `size` bytes and returns its payload
  /// pointer.
  ///
  /// The request is rounded up to [`ALIGN_SIZE`] and promoted to the
  /// minimum payload when smaller. The arena is scanned first-fit from the
  /// lowest-free hint; a loose fit is split so the tail stays allocatable:
  ///
  /// ```text
  ///   before                         after split
  ///   ┌────────┬───────────────┐     ┌────────┬──────┬────────┬──────┐
  ///   │ header │  free payload │ ──► │ header │ size │ header │ rest │
  ///   │ (free) │               │     │ (used) │      │ (free) │      │
  ///   └────────┴───────────────┘     └────────┴──────┴────────┴──────┘
  /// ```
  ///
  /// The split only happens when `rest` can hold a header plus the minimum
  /// payload; a thinner remainder would be unallocatable until a
  /// neighboring free rejoins it, so the block is handed out whole instead.
  ///
  /// # Returns
  ///
  /// An [`ALIGN_SIZE`]-aligned payload pointer, or null when `size` is
  /// zero, exceeds the arena, or no free block fits. A failed allocation
  /// leaves the heap unchanged.
  ///
  /// # Safety
  ///
  /// The heap's region must still be alive, and no other operation may run
  /// on this heap concurrently.
  pub unsafe fn alloc(
    &self,
    size: usize,
  ) -> *mut u8 {
    if size == 0 {
      return ptr::null_mut();
    }

    unsafe {
      let desc = self.desc;

      // Alignment size.
      let mut size = align!(size);

      // Every block must carry at least the minimum payload.
      if size < MIN_SIZE_ALIGNED {
        size = MIN_SIZE_ALIGNED;
      }

      if size > (*desc).size_aligned {
        debug!("no memory");
        return ptr::null_mut();
      }

      let mut off = (*desc).lfree as usize - (*desc).heap_ptr as usize;

      // Past this bound the arena suffix is too short for the request, so
      // the scan can stop before reaching the terminal sentinel.
      while off <= (*desc).size_aligned - size {
        let item = self.item_at(off);

        // `(*item).next - (off + SIZEOF_ITEM)` is the payload size of `item`.
        if !(*item).is_used() && (*item).next - (off + SIZEOF_ITEM) >= size {
          if (*item).next - (off + SIZEOF_ITEM)
            >= size + SIZEOF_ITEM + MIN_SIZE_ALIGNED
          {
            // Split: the remainder holds a header and at least the minimum
            // payload, so thread it back into the chain as a free block.
            let off2 = off + SIZEOF_ITEM + size;

            let item2 = self.item_at(off2);
            (*item2).pool = Item::free_tag(desc as usize);
            (*item2).next = (*item).next;
            (*item2).prev = off;

            // Insert it between `item` and the old successor.
            (*item).next = off2;

            if (*item2).next != (*desc).size_aligned + SIZEOF_ITEM {
              (*self.item_at((*item2).next)).prev = off2;
            }

            (*desc).used += size + SIZEOF_ITEM;
            if (*desc).max_used < (*desc).used {
              (*desc).max_used = (*desc).used;
            }
          } else {
            // Near or exact fit: no split. The successor is necessarily
            // used here, otherwise coalescing would already have merged it
            // into this block.
            (*desc).used += (*item).next - off;
            if (*desc).max_used < (*desc).used {
              (*desc).max_used = (*desc).used;
            }
          }

          (*item).pool = Item::used_tag(desc as usize);

          if item == (*desc).lfree {
            // The hint pointed at the chosen block; advance it to the next
            // free block (or the terminal sentinel).
            let mut lfree = (*desc).lfree;
            while (*lfree).is_used() && lfree != (*desc).heap_end {
              lfree = self.item_at((*lfree).next);
            }
            (*desc).lfree = lfree;

            debug_assert!(
              (*desc).lfree == (*desc).heap_end || !(*(*desc).lfree).is_used()
            );
          }

          debug_assert!(
            item as usize + SIZEOF_ITEM + size <= (*desc).heap_end as usize
          );
          debug_assert!((item as usize + SIZEOF_ITEM) % ALIGN_SIZE == 0);
          debug_assert!(item as usize % ALIGN_SIZE == 0);

          let payload = (item as *mut u8).add(SIZEOF_ITEM);

          trace!(
            "allocate memory at {:#x}, size: {}",
            payload as usize,
            (*item).next - off
          );

          // The payload follows the header.
          return payload;
        }

        off = (*item).next;
      }

      ptr::null_mut()
    }
  }

  /// Releases a block previously returned by [`alloc`](Self::alloc) or
  /// [`realloc`](Self::realloc).
  ///
  /// No heap handle is needed: the block header carries the owning
  /// descriptor's address in its tag word, so call sites that hold only the
  /// payload pointer can free it.
  ///
  /// The freed block is eagerly merged with free address neighbors in both
  /// directions, so no two adjacent free blocks survive this call, and the
  /// lowest-free hint retreats when the freed block sits below it.
  ///
  /// Passing null is a no-op.
  ///
  /// # Panics
  ///
  /// An unaligned pointer, a pointer outside the owning arena, or a block
  /// not currently marked used (double free) is a caller bug and fails an
  /// assertion.
  ///
  /// # Safety
  ///
  /// `rmem` must be null or a payload pointer obtained from this crate
  /// whose heap region is still alive, and no other operation may run on
  /// that heap concurrently. The payload must not be accessed afterwards.
  pub unsafe fn free(rmem: *mut u8) {
    if rmem.is_null() {
      return;
    }

    unsafe {
      assert!(rmem as usize % ALIGN_SIZE == 0);

      // Step back to the header, then recover the owning heap from its tag.
      let item = rmem.sub(SIZEOF_ITEM) as *mut Item;
      let desc = (*item).owner() as *mut HeapDescriptor;

      assert!(!desc.is_null());
      assert!((*item).is_used());

      let heap = SmallHeap { desc };

      assert!(
        rmem as usize >= (*desc).heap_ptr as usize
          && (rmem as usize) < (*desc).heap_end as usize
      );
      // The successor header must belong to the same heap; anything else
      // means the chain is corrupted.
      assert!((*heap.item_at((*item).next)).owner() == desc as usize);

      trace!(
        "release memory {:#x}, size: {}",
        rmem as usize,
        (*item).next - heap.offset_of(item)
      );

      (*item).pool = Item::free_tag(desc as usize);

      if item < (*desc).lfree {
        // The newly freed block is now the lowest.
        (*desc).lfree = item;
      }

      (*desc).used -= (*item).next - heap.offset_of(item);

      // Finally, see if either neighbor is free as well.
      heap.coalesce(item);
    }
  }

  /// Resizes a previously allocated block, moving it if necessary.
  ///
  /// | Condition                         | Action                          |
  /// |-----------------------------------|---------------------------------|
  /// | `newsize` exceeds the arena       | null, block untouched           |
  /// | `newsize == 0`                    | free `rmem`, return null        |
  /// | `rmem` is null                    | plain [`alloc`](Self::alloc)    |
  /// | aligned `newsize` == current size | return `rmem` unchanged         |
  /// | shrink with a tail worth a block  | split in place, keep `rmem`     |
  /// | anything else                     | alloc + copy + free, or null    |
  ///
  /// Growth never absorbs an adjacent free successor; it always moves to a
  /// fresh block, copying `min(old, new)` payload bytes. When that
  /// allocation fails the original block is left intact and null is
  /// returned.
  ///
  /// # Panics
  ///
  /// Fails an assertion if a non-null `rmem` is unaligned or lies outside
  /// this heap's arena.
  ///
  /// # Safety
  ///
  /// Same obligations as [`alloc`](Self::alloc) and [`free`](Self::free);
  /// additionally `rmem` must belong to this heap when non-null. After a
  /// move the old payload pointer must not be used.
  pub unsafe fn realloc(
    &self,
    rmem: *mut u8,
    newsize: usize,
  ) -> *mut u8 {
    unsafe {
      let desc = self.desc;

      // Alignment size.
      let newsize = align!(newsize);

      if newsize > (*desc).size_aligned {
        debug!("realloc: out of memory");
        return ptr::null_mut();
      } else if newsize == 0 {
        Self::free(rmem);
        return ptr::null_mut();
      }

      // Allocate a new memory block.
      if rmem.is_null() {
        return self.alloc(newsize);
      }

      assert!(rmem as usize % ALIGN_SIZE == 0);
      assert!(rmem as usize >= (*desc).heap_ptr as usize);
      assert!((rmem as usize) < (*desc).heap_end as usize);

      let item = rmem.sub(SIZEOF_ITEM) as *mut Item;

      // Current payload size.
      let off = self.offset_of(item);
      let size = (*item).next - off - SIZEOF_ITEM;
      if size == newsize {
        // The size is the same as before.
        return rmem;
      }

      if newsize + SIZEOF_ITEM + MIN_SIZE < size {
        // Shrink in place: split off the tail as a new free block.
        (*desc).used -= size - newsize;

        let off2 = off + SIZEOF_ITEM + newsize;
        let item2 = self.item_at(off2);
        (*item2).pool = Item::free_tag(desc as usize);
        (*item2).next = (*item).next;
        (*item2).prev = off;
        (*item).next = off2;
        if (*item2).next != (*desc).size_aligned + SIZEOF_ITEM {
          (*self.item_at((*item2).next)).prev = off2;
        }

        if item2 < (*desc).lfree {
          // The split-off tail is now the lowest free block.
          (*desc).lfree = item2;
        }

        self.coalesce(item2);

        return rmem;
      }

      // Grow, or a shrink too thin to split: move to a fresh block.
      let nmem = self.alloc(newsize);
      if !nmem.is_null() {
        ptr::copy_nonoverlapping(rmem, nmem, size.min(newsize));
        Self::free(rmem);
      }

      nmem
    }
  }

  /// Returns the heap's usage counters.
  ///
  /// # Safety
  ///
  /// The heap's region must still be alive, and no other operation may run
  /// on this heap concurrently.
  pub unsafe fn stats(&self) -> HeapStats {
    unsafe {
      HeapStats {
        address: (*self.desc).address,
        total: (*self.desc).total,
        used: (*self.desc).used,
        max_used: (*self.desc).max_used,
      }
    }
  }

  /// Merges the free block `item` with its free address neighbors.
  ///
  /// Forward: a free successor (never the terminal sentinel) is spliced out
  /// and its range absorbed. Backward: `item` itself is spliced into a free
  /// predecessor. Absorbed headers get their tag cleared to zero and are
  /// never decoded again; the lowest-free hint is moved off them first.
  unsafe fn coalesce(
    &self,
    item: *mut Item,
  ) {
    unsafe {
      let desc = self.desc;

      debug_assert!(item as usize >= (*desc).heap_ptr as usize);
      debug_assert!((item as usize) < (*desc).heap_end as usize);

      // Plug hole forward.
      let nitem = self.item_at((*item).next);
      if item != nitem && !(*nitem).is_used() && nitem != (*desc).heap_end {
        if (*desc).lfree == nitem {
          (*desc).lfree = item;
        }

        (*nitem).pool = 0;
        (*item).next = (*nitem).next;
        (*self.item_at((*item).next)).prev = self.offset_of(item);
      }

      // Plug hole backward.
      let pitem = self.item_at((*item).prev);
      if pitem != item && !(*pitem).is_used() {
        if (*desc).lfree == item {
          (*desc).lfree = pitem;
        }

        (*item).pool = 0;
        (*pitem).next = (*item).next;
        (*self.item_at((*item).next)).prev = self.offset_of(pitem);
      }
    }
  }

  /// Header at the given byte offset from the arena start.
  unsafe fn item_at(
    &self,
    offset: usize,
  ) -> *mut Item {
    unsafe { (*self.desc).heap_ptr.add(offset) as *mut Item }
  }

  /// Byte offset of a header from the arena start.
  unsafe fn offset_of(
    &self,
    item: *const Item,
  ) -> usize {
    unsafe { item as usize - (*self.desc).heap_ptr as usize }
  }
}
