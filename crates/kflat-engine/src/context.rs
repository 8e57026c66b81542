//! One flattening run.

use std::collections::{BTreeSet, VecDeque};

use kflat_core::{
    Container, FieldKind, POINTER_SIZE, PointerCodec, PointerTarget, RestoreFn, TypeId,
    TypeRegistry,
};
use log::{debug, trace, warn};

use crate::config::{FlattenConfig, InvalidPointerPolicy};
use crate::emit::write_image;
use crate::error::FlattenError;
use crate::fixup::{FixupSet, InsertOutcome, node_offset};
use crate::memory::SourceMemory;
use crate::node_table::{DeferredSlot, NodeId, NodeTable};
use crate::pointer::PointerRef;
use crate::roots::RootRegistry;
use crate::stream::BinaryStream;

/// What a staged node holds.
#[derive(Clone, Copy, Debug)]
enum Shape {
    /// `count` consecutive instances of `ty`.
    Instances { ty: TypeId, count: usize },
    /// NUL-terminated text, terminator included.
    Text,
}

/// A node whose bytes were read but not yet appended.
struct Job {
    node: NodeId,
    shape: Shape,
    bytes: Vec<u8>,
}

/// Position inside a node, with the source address it was read from.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Place {
    pub node: NodeId,
    /// Offset from the start of the node.
    pub rel: u64,
    pub address: u64,
}

impl Place {
    pub fn advance(self, by: usize) -> Self {
        Self {
            node: self.node,
            rel: self.rel + by as u64,
            address: self.address.wrapping_add(by as u64),
        }
    }

    /// Reference to this position.
    pub fn ptr(self) -> PointerRef {
        PointerRef::to(self.node, self.rel)
    }
}

/// State of one flattening run.
///
/// Reachable structures are discovered through the descriptors of `types`,
/// read from `memory`, and appended in discovery order. Nodes wait in a FIFO
/// queue between discovery and emission, so deep lists and trees never
/// recurse on the native stack.
pub struct FlattenContext<'a> {
    memory: &'a dyn SourceMemory,
    types: &'a TypeRegistry,
    config: FlattenConfig,
    stream: BinaryStream,
    nodes: NodeTable,
    fixups: FixupSet,
    roots: RootRegistry,
    queue: VecDeque<Job>,
    /// Bytes read into queued jobs, not yet in the stream.
    queued: u64,
    /// Slots the descriptors declare as pointers, checked against the fixups at the end.
    pointer_slots: BTreeSet<(NodeId, u64)>,
}

impl<'a> FlattenContext<'a> {
    pub fn new(
        memory: &'a dyn SourceMemory,
        types: &'a TypeRegistry,
        config: FlattenConfig,
    ) -> Result<Self, FlattenError> {
        types.validate()?;
        debug!(
            "flatten run: {} types, limit {} bytes",
            types.len(),
            config.max_size
        );
        Ok(Self {
            memory,
            types,
            stream: BinaryStream::new(config.max_size),
            config,
            nodes: NodeTable::new(),
            fixups: FixupSet::new(),
            roots: RootRegistry::new(),
            queue: VecDeque::new(),
            queued: 0,
            pointer_slots: BTreeSet::new(),
        })
    }

    pub fn type_id(&self, name: &str) -> Result<TypeId, FlattenError> {
        self.types
            .lookup(name)
            .ok_or_else(|| FlattenError::UnknownType(name.to_owned()))
    }

    /// Flatten the `ty` instance at `address` and everything reachable from it.
    pub fn flatten(&mut self, address: u64, ty: TypeId) -> Result<PointerRef, FlattenError> {
        self.flatten_target(address, PointerTarget::one(ty))
    }

    /// Flatten `count` consecutive `ty` instances starting at `address`.
    pub fn flatten_array(
        &mut self,
        address: u64,
        ty: TypeId,
        count: usize,
    ) -> Result<PointerRef, FlattenError> {
        self.flatten_target(address, PointerTarget::array(ty, count))
    }

    /// Flatten what a pointer with the given target description refers to.
    ///
    /// There is no pointing instance here, so a [`Count::Field`](kflat_core::Count::Field)
    /// count resolves to zero.
    pub fn flatten_target(
        &mut self,
        address: u64,
        target: PointerTarget,
    ) -> Result<PointerRef, FlattenError> {
        let ptr = self.follow(address, target, &[])?;
        self.drain()?;
        Ok(ptr)
    }

    pub fn register_root(&mut self, name: &str, ty: TypeId, ptr: PointerRef) {
        self.roots.register(name, self.types.name(ty), ptr);
    }

    /// [`flatten`](Self::flatten) followed by [`register_root`](Self::register_root).
    pub fn flatten_root(
        &mut self,
        name: &str,
        address: u64,
        ty: TypeId,
    ) -> Result<PointerRef, FlattenError> {
        let ptr = self.flatten(address, ty)?;
        self.register_root(name, ty, ptr);
        Ok(ptr)
    }

    pub fn config(&self) -> &FlattenConfig {
        &self.config
    }

    pub fn types(&self) -> &'a TypeRegistry {
        self.types
    }

    pub fn stream(&self) -> &BinaryStream {
        &self.stream
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub fn fixups(&self) -> &FixupSet {
        &self.fixups
    }

    pub fn roots(&self) -> &RootRegistry {
        &self.roots
    }

    #[cfg(test)]
    pub(crate) fn nodes_mut(&mut self) -> &mut NodeTable {
        &mut self.nodes
    }

    /// Resolve all fixups and produce the image bytes.
    pub fn finish(mut self) -> Result<Vec<u8>, FlattenError> {
        self.drain()?;

        if let Some((id, node)) = self.nodes.first_unemitted() {
            return Err(FlattenError::UnresolvedCycleNode {
                node: id.get(),
                address: node.address(),
                size: node.size(),
            });
        }
        for &(node, rel) in &self.pointer_slots {
            let slot = node_offset(&self.nodes, node)? + rel;
            if !self.fixups.contains(slot) {
                return Err(FlattenError::MissingFixupTarget { slot });
            }
        }

        let fixups = self.fixups.resolve(&self.nodes)?;
        let image = write_image(&self.stream, &self.nodes, &fixups, &self.roots)?;
        debug!(
            "flattened {} nodes, {} fixups, {} roots: {} data bytes, {} image bytes",
            self.nodes.len(),
            fixups.len(),
            self.roots.len(),
            self.stream.len(),
            image.len()
        );
        Ok(image)
    }

    fn drain(&mut self) -> Result<(), FlattenError> {
        while let Some(job) = self.queue.pop_front() {
            self.queued -= job.bytes.len() as u64;
            self.emit(job)?;
        }
        Ok(())
    }

    fn emit(&mut self, job: Job) -> Result<(), FlattenError> {
        let node = self.nodes.get(job.node);
        let (address, align) = (node.address(), node.align());

        let offset = self.stream.append_aligned(&job.bytes, align)?;
        trace!(
            "node {} {address:#x} +{} at @{offset:#x}",
            job.node.get(),
            job.bytes.len()
        );
        for slot in self.nodes.set_offset(job.node, offset) {
            self.record(job.node, offset + slot.rel, slot.ptr, slot.restore)?;
        }

        if let Shape::Instances { ty, count } = job.shape {
            let size = self.types.desc(ty)?.size;
            let start = Place {
                node: job.node,
                rel: 0,
                address,
            };
            for idx in 0..count {
                let rel = idx * size;
                self.walk(start.advance(rel), ty, &job.bytes[rel..rel + size])?;
            }
        }
        Ok(())
    }

    /// Apply the descriptor of `ty` to one instance.
    fn walk(&mut self, at: Place, ty: TypeId, bytes: &[u8]) -> Result<(), FlattenError> {
        let types = self.types;
        let plain = PointerCodec::PLAIN.restore_fn();

        for field in &types.desc(ty)?.fields {
            let offset = field.offset;
            match field.kind {
                FieldKind::Raw { .. } => {}
                FieldKind::Embedded { ty } => {
                    let size = types.desc(ty)?.size;
                    self.walk(at.advance(offset), ty, &bytes[offset..offset + size])?;
                }
                FieldKind::Pointer(target) => {
                    self.expect(at.node, at.rel + offset as u64);
                    let ptr = self.follow(read_word(bytes, offset), target, bytes)?;
                    self.link(at.node, at.rel + offset as u64, ptr, plain)?;
                }
                FieldKind::TaggedPointer { target, codec } => {
                    self.expect(at.node, at.rel + offset as u64);
                    let (address, tag) = codec.strip(read_word(bytes, offset));
                    let ptr = self.follow(address, target, bytes)?.with_tag(tag);
                    self.link(at.node, at.rel + offset as u64, ptr, codec.restore_fn())?;
                }
                FieldKind::Text => {
                    self.expect(at.node, at.rel + offset as u64);
                    let ptr = self.follow_text(read_word(bytes, offset))?;
                    self.link(at.node, at.rel + offset as u64, ptr, plain)?;
                }
                FieldKind::Container(container) => {
                    self.walk_container(at.advance(offset), container)?;
                }
            }
        }
        Ok(())
    }

    /// Reference for a pointer value, staging its target if unseen.
    ///
    /// `instance` is the pointing instance, used to resolve counted arrays.
    fn follow(
        &mut self,
        address: u64,
        target: PointerTarget,
        instance: &[u8],
    ) -> Result<PointerRef, FlattenError> {
        if address == 0 {
            return Ok(PointerRef::NULL);
        }
        let desc = self.types.desc(target.ty)?;
        let count = target.count.resolve(instance);
        let Some(size) = desc.size.checked_mul(count) else {
            return Err(FlattenError::SizeExceeded {
                limit: self.stream.limit(),
                attempted: u64::MAX,
            });
        };
        let start = address.wrapping_add_signed(target.shift);

        let staged = self.stage(start, size, desc.align, Shape::Instances { ty: target.ty, count });
        let node = self.lenient(staged)?;
        Ok(node.map_or(PointerRef::NULL, |id| {
            PointerRef::to(id, address.wrapping_sub(start))
        }))
    }

    fn follow_text(&mut self, address: u64) -> Result<PointerRef, FlattenError> {
        if address == 0 {
            return Ok(PointerRef::NULL);
        }
        let staged = self.read_text(address).and_then(|bytes| {
            if let Some(id) = self.nodes.find(address, bytes.len()) {
                return Ok(id);
            }
            self.charge(bytes.len())?;
            Ok(self.enqueue(address, 1, Shape::Text, bytes))
        });
        let node = self.lenient(staged)?;
        Ok(node.map_or(PointerRef::NULL, |id| PointerRef::to(id, 0)))
    }

    /// Apply the invalid-pointer policy to a failed read.
    fn lenient(
        &self,
        staged: Result<NodeId, FlattenError>,
    ) -> Result<Option<NodeId>, FlattenError> {
        match staged {
            Ok(id) => Ok(Some(id)),
            Err(FlattenError::InvalidRead { address, len })
                if self.config.invalid_pointers == InvalidPointerPolicy::TreatAsNull =>
            {
                warn!("treating pointer to unreadable {len} bytes at {address:#x} as null");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Node for a region, reading and queueing it on first sight.
    fn stage(
        &mut self,
        address: u64,
        size: usize,
        align: usize,
        shape: Shape,
    ) -> Result<NodeId, FlattenError> {
        if let Some(id) = self.nodes.find(address, size) {
            return Ok(id);
        }
        self.charge(size)?;
        let bytes = self.read(address, size)?;
        Ok(self.enqueue(address, align, shape, bytes))
    }

    /// Fail if `size` more bytes would push the run past its size limit.
    ///
    /// Counts queued jobs too, so nothing is read that could never be appended.
    fn charge(&self, size: usize) -> Result<(), FlattenError> {
        let limit = self.stream.limit();
        let attempted = self
            .stream
            .len()
            .saturating_add(self.queued)
            .saturating_add(size as u64);
        if attempted > limit {
            return Err(FlattenError::SizeExceeded { limit, attempted });
        }
        Ok(())
    }

    fn enqueue(&mut self, address: u64, align: usize, shape: Shape, bytes: Vec<u8>) -> NodeId {
        let (id, is_new) = self.nodes.resolve_or_create(address, bytes.len(), align);
        if is_new {
            self.queued += bytes.len() as u64;
            self.queue.push_back(Job {
                node: id,
                shape,
                bytes,
            });
        }
        id
    }

    fn read(&self, address: u64, size: usize) -> Result<Vec<u8>, FlattenError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|_| FlattenError::AllocationFailure { size })?;
        bytes.resize(size, 0);
        if size > 0 {
            self.memory.read(address, &mut bytes)?;
        }
        Ok(bytes)
    }

    fn read_text(&self, address: u64) -> Result<Vec<u8>, FlattenError> {
        let limit = self.config.max_string_len;
        let mut text = Vec::new();
        let mut byte = [0u8];
        loop {
            let at = address
                .checked_add(text.len() as u64)
                .ok_or(FlattenError::InvalidRead {
                    address,
                    len: text.len() + 1,
                })?;
            self.memory.read(at, &mut byte)?;
            text.try_reserve(1)
                .map_err(|_| FlattenError::AllocationFailure { size: text.len() + 1 })?;
            text.push(byte[0]);
            if byte[0] == 0 {
                return Ok(text);
            }
            if text.len() > limit {
                return Err(FlattenError::UnterminatedString { address, limit });
            }
        }
    }

    /// Read the pointer word `offset` bytes past `base` in source memory.
    pub(crate) fn read_word_at(&self, base: u64, offset: u64) -> Result<u64, FlattenError> {
        let address = base.checked_add(offset).ok_or(FlattenError::InvalidRead {
            address: base,
            len: offset as usize + POINTER_SIZE,
        })?;
        Ok(self.memory.read_u64(address)?)
    }

    /// Node of the element whose link sits at `link_address`.
    ///
    /// Unreadable elements always fail: a container with a hole cannot be
    /// reproduced faithfully.
    pub(crate) fn element(
        &mut self,
        link_address: u64,
        container: Container,
    ) -> Result<NodeId, FlattenError> {
        let desc = self.types.desc(container.element)?;
        let start = link_address.wrapping_sub(container.link as u64);
        let shape = Shape::Instances {
            ty: container.element,
            count: 1,
        };
        let id = self.stage(start, desc.size, desc.align, shape)?;
        for &slot in container.kind.link_slots() {
            self.expect(id, (container.link + slot) as u64);
        }
        Ok(id)
    }

    /// Declare a pointer slot that must end up with a fixup.
    pub(crate) fn expect(&mut self, node: NodeId, rel: u64) {
        self.pointer_slots.insert((node, rel));
    }

    /// Set the pointer slot at `rel` in `node`, now or once the node is emitted.
    pub(crate) fn link(
        &mut self,
        node: NodeId,
        rel: u64,
        ptr: PointerRef,
        restore: RestoreFn,
    ) -> Result<(), FlattenError> {
        match self.nodes.offset(node) {
            Some(offset) => self.record(node, offset + rel, ptr, restore),
            None => {
                self.nodes.defer(node, DeferredSlot { rel, ptr, restore });
                Ok(())
            }
        }
    }

    /// Register a fixup; tag bits are merged into the fresh entry afterwards.
    fn record(
        &mut self,
        owner: NodeId,
        slot: u64,
        ptr: PointerRef,
        restore: RestoreFn,
    ) -> Result<(), FlattenError> {
        match self.fixups.insert(owner, slot, ptr.untagged(), restore) {
            InsertOutcome::Inserted if ptr.tag != 0 => self.fixups.update(owner, slot, ptr),
            InsertOutcome::Inserted => Ok(()),
            InsertOutcome::Duplicate => {
                trace!("slot @{slot:#x} already has a fixup");
                Ok(())
            }
        }
    }
}

fn read_word(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; POINTER_SIZE];
    raw.copy_from_slice(&bytes[offset..offset + POINTER_SIZE]);
    u64::from_le_bytes(raw)
}
