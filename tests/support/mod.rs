//! Shared fixtures for the end-to-end tests: an in-memory `FileData`/
//! `InodeCache` pair backed by plain `Vec<u8>`/`HashMap` storage, hand-built
//! rather than pulled in from a mock-object crate.

use std::cell::RefCell;
use std::collections::HashMap;

use ext2dir::{DirError, FileData, InodeCache, MapProt, MappedWindow, NodeHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TestNode(pub u32);

impl NodeHandle for TestNode {
    fn inum(&self) -> u32 {
        self.0
    }
}

/// A single node's backing bytes, grown on demand by `grow`.
pub struct MemFile {
    pub data: RefCell<Vec<u8>>,
}

pub struct InMemoryFileData {
    files: HashMap<u32, MemFile>,
}

impl InMemoryFileData {
    pub fn new() -> Self {
        Self { files: HashMap::new() }
    }

    pub fn insert(&mut self, node: TestNode, data: Vec<u8>) {
        self.files.insert(node.inum(), MemFile { data: RefCell::new(data) });
    }

    pub fn bytes(&self, node: TestNode) -> Vec<u8> {
        self.files[&node.inum()].data.borrow().clone()
    }
}

impl FileData<TestNode> for InMemoryFileData {
    fn map(&self, node: &TestNode, len: u64, _prot: MapProt) -> Result<MappedWindow, DirError> {
        let file = self.files.get(&node.inum()).ok_or(DirError::IoError)?;
        let mut data = file.data.borrow().clone();
        data.resize(len as usize, 0);
        Ok(MappedWindow::new(data))
    }

    fn unmap(&self, node: &TestNode, window: MappedWindow) -> Result<(), DirError> {
        let file = self.files.get(&node.inum()).ok_or(DirError::IoError)?;
        *file.data.borrow_mut() = window.data;
        Ok(())
    }

    fn read(&self, node: &TestNode, buf: &mut [u8], offset: u64) -> Result<usize, DirError> {
        let file = self.files.get(&node.inum()).ok_or(DirError::IoError)?;
        let data = file.data.borrow();
        let offset = offset as usize;
        if offset >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    fn grow(&self, node: &TestNode, new_size: u64) -> Result<(), DirError> {
        let file = self.files.get(&node.inum()).ok_or(DirError::IoError)?;
        let mut data = file.data.borrow_mut();
        if (data.len() as u64) < new_size {
            data.resize(new_size as usize, 0);
        }
        Ok(())
    }

    fn size(&self, node: &TestNode) -> Result<u64, DirError> {
        let file = self.files.get(&node.inum()).ok_or(DirError::IoError)?;
        Ok(file.data.borrow().len() as u64)
    }

    fn update_metadata(&self, _node: &TestNode, _wait: bool) -> Result<(), DirError> {
        Ok(())
    }
}

pub struct InMemoryInodeCache {
    resident: RefCell<HashMap<u32, TestNode>>,
}

impl InMemoryInodeCache {
    pub fn new() -> Self {
        Self { resident: RefCell::new(HashMap::new()) }
    }

    pub fn make_resident(&self, node: TestNode) {
        self.resident.borrow_mut().insert(node.inum(), node);
    }
}

impl InodeCache<TestNode> for InMemoryInodeCache {
    fn cached_lookup(&self, inum: u32) -> Result<TestNode, DirError> {
        Ok(*self.resident.borrow_mut().entry(inum).or_insert(TestNode(inum)))
    }

    fn find_if_cached(&self, inum: u32) -> Option<TestNode> {
        self.resident.borrow().get(&inum).copied()
    }
}
