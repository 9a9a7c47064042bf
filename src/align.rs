/// Calculates the machine word alignment for the given size.
///
/// # Examples
///
/// ```rust
/// use std::mem;
/// use smallheap::align;
///
/// match mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + mem::size_of::<usize>() - 1) & !(mem::size_of::<usize>() - 1)
  };
}

/// Rounds the given value down to the previous machine word boundary.
///
/// # Examples
///
/// ```rust
/// use std::mem;
/// use smallheap::align_down;
///
/// match mem::size_of::<usize>() {
///     8 => assert_eq!(align_down!(13), 8), // 64 bit machine.
///     4 => assert_eq!(align_down!(11), 8), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align_down {
  ($value:expr) => {
    $value & !(mem::size_of::<usize>() - 1)
  };
}

#[cfg(test)]
mod tests {
  use std::mem;

  #[test]
  fn test_align() {
    let ptr_size = mem::size_of::<usize>();

    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (ptr_size * i + 1)..=(ptr_size * (i + 1));

      let expected_alignment = ptr_size * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn test_align_down() {
    let ptr_size = mem::size_of::<usize>();

    for i in 0..10 {
      for size in (ptr_size * i)..(ptr_size * (i + 1)) {
        assert_eq!(ptr_size * i, align_down!(size));
      }
    }

    for i in 0..10 {
      assert_eq!(ptr_size * i, align!(ptr_size * i));
      assert_eq!(ptr_size * i, align_down!(ptr_size * i));
    }
  }
}
