/// Low bit of `pool`: 1 = used, 0 = free.
pub const STATUS_MASK: usize = 0x1;

/// Remaining bits of `pool`: address of the owning heap descriptor.
/// Descriptors are word-aligned, so the low bit is always available.
pub const OWNER_MASK: usize = !STATUS_MASK;

/// Header prefixed to every block in the arena. Three machine words.
///
/// `next` and `prev` are byte offsets from the arena start, threading the
/// blocks into a doubly linked list in address order.
#[repr(C)]
pub struct Item {
  pub pool: usize,
  pub next: usize,
  pub prev: usize,
}

impl Item {
  pub fn used_tag(owner: usize) -> usize {
    (owner & OWNER_MASK) | 0x1
  }

  pub fn free_tag(owner: usize) -> usize {
    owner & OWNER_MASK
  }

  pub fn is_used(&self) -> bool {
    self.pool & STATUS_MASK != 0
  }

  pub fn owner(&self) -> usize {
    self.pool & OWNER_MASK
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tag_encodes_status_in_low_bit() {
    // Any word-aligned descriptor address has a zero low bit.
    let owner = 0x7f00_1230_usize;

    let item = Item {
      pool: Item::used_tag(owner),
      next: 0,
      prev: 0,
    };
    assert!(item.is_used());
    assert_eq!(item.owner(), owner);

    let item = Item {
      pool: Item::free_tag(owner),
      next: 0,
      prev: 0,
    };
    assert!(!item.is_used());
    assert_eq!(item.owner(), owner);
  }

  #[test]
  fn tag_discards_stray_low_bit_of_owner() {
    // The encoding masks the owner before or-ing the status bit, so a
    // misaligned owner address cannot leak into the status.
    assert_eq!(Item::free_tag(0x1001), 0x1000);
    assert_eq!(Item::used_tag(0x1001), 0x1001);
  }

  #[test]
  fn zeroed_header_decodes_as_ownerless_free() {
    // Coalescing clears absorbed headers to zero. Such a header must never
    // read back as used or as belonging to any heap.
    let item = Item {
      pool: 0,
      next: 0,
      prev: 0,
    };
    assert!(!item.is_used());
    assert_eq!(item.owner(), 0);
  }
}
