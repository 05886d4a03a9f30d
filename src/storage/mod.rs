mod on_disk;
pub(crate) use on_disk::*;

#[cfg(test)]
mod in_memory;
#[cfg(test)]
pub(crate) use in_memory::*;
