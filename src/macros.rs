#![allow(unused_macros)]

/// Helper macro for reading locked items
///
/// ```rust, ignore
///  let dirs = read_lock!(self.directories);
///  println!("{}", dirs.len());
/// ```
macro_rules! read_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock.read().expect("Failed to acquire read lock")
    };
}

/// Helper macro for writing to locked items
///
/// ```rust, ignore
///  let mut dirs = write_lock!(self.directories);
///  dirs.push(path);
/// ```
macro_rules! write_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock.write().expect("Failed to acquire write lock")
    };
}
