//! Record CRUD, split by read and write.

mod read;
mod write;

#[cfg(test)]
pub(crate) use read::row_to_record;
#[cfg(test)]
pub(crate) use write::INTERRUPTED_LOG;
