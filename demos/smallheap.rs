use std::{io::Read, ptr};

use libc::{c_void, free as libc_free, malloc};
use smallheap::SmallHeap;

/// Size of the backing region handed to the heap. Small on purpose, so the
/// whole region fits on one screen of hex dump.
const HEAP_SIZE: usize = 512;

/// Waits until the user presses ENTER.
/// Useful when you want to compare consecutive dumps calmly, or inspect the
/// process with external tools while it sits on a known heap state.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Dumps `length` bytes at `mem` in the classic offset / hex / ASCII
/// format, sixteen bytes per row.
unsafe fn print_memory(
  mem: *const u8,
  length: usize,
) {
  for i in (0..length).step_by(16) {
    // Row offset into the region.
    print!("{:08x}  ", i);

    for j in 0..16 {
      if i + j < length {
        print!("{:02x} ", unsafe { *mem.add(i + j) });
      } else {
        print!("   ");
      }
    }

    print!(" ");
    for j in 0..16 {
      if i + j < length {
        let byte = unsafe { *mem.add(i + j) };
        let shown = if byte.is_ascii_graphic() { byte as char } else { '.' };
        print!("{}", shown);
      }
    }

    println!();
  }
}

fn main() {
  // Run with RUST_LOG=trace to see the allocator's per-operation records.
  env_logger::init();

  println!("Hello small heap");

  unsafe {
    // The backing region comes from wherever the caller likes; here plain
    // malloc stands in for a static buffer or a reserved memory range.
    let region = malloc(HEAP_SIZE) as *mut u8;
    assert!(!region.is_null());
    ptr::write_bytes(region, 0, HEAP_SIZE);

    // --------------------------------------------------------------------
    // 1) Place the heap over the region. Descriptor, block headers and the
    //    terminal sentinel become visible in the dump.
    // --------------------------------------------------------------------
    let heap = SmallHeap::init(region, HEAP_SIZE).expect("region too small");
    println!("\n[1] Heap initialized over {} bytes", HEAP_SIZE);
    print_memory(region, HEAP_SIZE);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Allocate 20 bytes and fill them with 0x0a. Watch the first block
    //    split: a used header, the payload pattern, then the free rest.
    // --------------------------------------------------------------------
    let bufa = heap.alloc(20);
    assert!(!bufa.is_null());
    ptr::write_bytes(bufa, 0x0a, 20);
    println!("\n[2] Allocated 20 bytes at {:p}, filled with 0x0a", bufa);
    print_memory(region, HEAP_SIZE);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) A second allocation lands right behind the first.
    // --------------------------------------------------------------------
    let bufb = heap.alloc(24);
    assert!(!bufb.is_null());
    ptr::write_bytes(bufb, 0x0b, 24);
    println!("\n[3] Allocated 24 bytes at {:p}, filled with 0x0b", bufb);
    print_memory(region, HEAP_SIZE);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Free the first buffer and allocate 18 bytes: first-fit reuses the
    //    freed slot, so the new pattern overwrites the old 0x0a bytes.
    // --------------------------------------------------------------------
    SmallHeap::free(bufa);
    let bufc = heap.alloc(18);
    assert!(!bufc.is_null());
    ptr::write_bytes(bufc, 0x0c, 18);
    println!(
      "\n[4] Freed the first buffer, allocated 18 bytes at {:p}",
      bufc
    );
    println!(
      "[4] bufc == bufa? {}",
      if bufc == bufa {
        "Yes, it reused the freed slot"
      } else {
        "No, it allocated somewhere else"
      }
    );
    print_memory(region, HEAP_SIZE);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Usage counters straight from the in-region descriptor.
    // --------------------------------------------------------------------
    let stats = heap.stats();
    println!(
      "\n[5] total = {}, used = {}, peak = {}",
      stats.total, stats.used, stats.max_used
    );

    // --------------------------------------------------------------------
    // 6) Drain the heap. After the last free the arena is one free block
    //    again, stale payload patterns and all.
    // --------------------------------------------------------------------
    SmallHeap::free(bufb);
    SmallHeap::free(bufc);
    println!("\n[6] Everything freed, used = {}", heap.stats().used);
    print_memory(region, HEAP_SIZE);

    libc_free(region as *mut c_void);
  }
}
