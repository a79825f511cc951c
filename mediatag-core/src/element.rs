//! Generic lazy traversal of tree-structured binary containers.
//!
//! ISO-BMFF atoms and EBML elements share the same shape: a size-prefixed
//! header followed by a payload that may itself contain elements. The tree is
//! kept as an arena of nodes addressed by index; parent, first-child and
//! next-sibling links are indices, discovered lazily on first traversal and
//! memoised. Reparsing a file clears the arena wholesale.
//!
//! Traversal is strictly single-threaded and non-reentrant on a given stream;
//! reading the same file from two places requires separate stream handles.

use crate::diag::Diagnostics;
use crate::error::Result;
use crate::io::BinaryReader;
use std::io::{Read, Seek};
use std::marker::PhantomData;

/// Index of an element within its [`ElementTree`].
pub type ElementIndex = usize;

/// Header of one element as decoded by an [`ElementFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawElementHeader<Id> {
    /// Format-specific identifier.
    pub id: Id,
    /// Header length in bytes.
    pub header_len: u32,
    /// Payload length; `None` means "unknown, extends to the parent bound".
    pub data_len: Option<u64>,
}

/// Capability set a container format implements to participate in the
/// generic traversal.
pub trait ElementFormat {
    /// Format-specific element identifier (FourCC for MP4, VINT id for EBML).
    type Id: Copy + PartialEq + Eq + std::fmt::Debug;

    /// Container name used in diagnostics contexts.
    const CONTAINER_NAME: &'static str;

    /// Read one element header at the current stream position.
    ///
    /// `remaining` is the number of bytes left inside the enclosing span.
    /// Returns `Ok(None)` when no further element fits.
    fn read_header<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        remaining: u64,
    ) -> Result<Option<RawElementHeader<Self::Id>>>;

    /// Whether elements with this header hold child elements.
    fn is_parent(header: &RawElementHeader<Self::Id>) -> bool;

    /// Bytes of leading payload before the first child (e.g. the version and
    /// flags of an MP4 `meta` atom).
    fn child_payload_offset(header: &RawElementHeader<Self::Id>) -> u64 {
        let _ = header;
        0
    }

    /// Render an id for diagnostics.
    fn display_id(id: Self::Id) -> String;
}

/// One node of the element arena.
#[derive(Debug, Clone)]
pub struct ElementNode<Id> {
    /// Format-specific identifier.
    pub id: Id,
    /// Absolute offset of the element header.
    pub start_offset: u64,
    /// Header length in bytes.
    pub header_len: u32,
    /// Resolved payload length (unknown sizes are clamped to the bound).
    pub data_len: u64,
    /// Parent element, if any.
    pub parent: Option<ElementIndex>,
    /// Whether the element may hold children.
    pub is_parent: bool,
    /// Leading payload bytes before the first child.
    pub child_payload_offset: u64,
    /// Absolute offset one past the enclosing span (parent end or file end).
    bound: u64,
    /// Memoised first child: outer `None` = not yet discovered.
    first_child: Option<Option<ElementIndex>>,
    /// Memoised next sibling: outer `None` = not yet discovered.
    next_sibling: Option<Option<ElementIndex>>,
}

impl<Id: Copy> ElementNode<Id> {
    /// Total length: header plus payload.
    pub fn total_len(&self) -> u64 {
        self.header_len as u64 + self.data_len
    }

    /// Absolute offset of the payload.
    pub fn data_offset(&self) -> u64 {
        self.start_offset + self.header_len as u64
    }

    /// Absolute offset one past the element.
    pub fn end_offset(&self) -> u64 {
        self.start_offset + self.total_len()
    }
}

/// Arena-backed lazy element tree for one container file.
#[derive(Debug)]
pub struct ElementTree<F: ElementFormat> {
    nodes: Vec<ElementNode<F::Id>>,
    _format: PhantomData<F>,
}

impl<F: ElementFormat> Default for ElementTree<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ElementFormat> ElementTree<F> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            _format: PhantomData,
        }
    }

    /// Drop all nodes; used when the file is reparsed.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Number of discovered elements.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no element has been discovered yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Access a node.
    pub fn node(&self, index: ElementIndex) -> &ElementNode<F::Id> {
        &self.nodes[index]
    }

    /// Read the element starting at `offset`, bounded by `bound` (typically
    /// the file length). Returns `None` when no element fits.
    pub fn read_at<R: Read + Seek>(
        &mut self,
        reader: &mut BinaryReader<R>,
        offset: u64,
        bound: u64,
        diag: &mut Diagnostics,
    ) -> Result<Option<ElementIndex>> {
        self.read_element(reader, offset, bound, None, diag)
    }

    /// First child of `index`, discovering it on first call.
    pub fn first_child<R: Read + Seek>(
        &mut self,
        reader: &mut BinaryReader<R>,
        index: ElementIndex,
        diag: &mut Diagnostics,
    ) -> Result<Option<ElementIndex>> {
        if let Some(memo) = self.nodes[index].first_child {
            return Ok(memo);
        }
        let node = &self.nodes[index];
        let child = if node.is_parent {
            let start = node.data_offset() + node.child_payload_offset;
            let bound = node.end_offset();
            self.read_element(reader, start, bound, Some(index), diag)?
        } else {
            None
        };
        self.nodes[index].first_child = Some(child);
        Ok(child)
    }

    /// Next sibling of `index`, discovering it on first call.
    pub fn next_sibling<R: Read + Seek>(
        &mut self,
        reader: &mut BinaryReader<R>,
        index: ElementIndex,
        diag: &mut Diagnostics,
    ) -> Result<Option<ElementIndex>> {
        if let Some(memo) = self.nodes[index].next_sibling {
            return Ok(memo);
        }
        let node = &self.nodes[index];
        let start = node.end_offset();
        let bound = node.bound;
        let parent = node.parent;
        let sibling = self.read_element(reader, start, bound, parent, diag)?;
        self.nodes[index].next_sibling = Some(sibling);
        Ok(sibling)
    }

    /// Sequential scan of the children of `index` for the first child with
    /// the given id.
    pub fn child_by_id<R: Read + Seek>(
        &mut self,
        reader: &mut BinaryReader<R>,
        index: ElementIndex,
        id: F::Id,
        diag: &mut Diagnostics,
    ) -> Result<Option<ElementIndex>> {
        let mut child = self.first_child(reader, index, diag)?;
        while let Some(c) = child {
            if self.nodes[c].id == id {
                return Ok(Some(c));
            }
            child = self.next_sibling(reader, c, diag)?;
        }
        Ok(None)
    }

    /// Walk a path of ids starting from the children of `index`.
    pub fn descendant_by_path<R: Read + Seek>(
        &mut self,
        reader: &mut BinaryReader<R>,
        index: ElementIndex,
        path: &[F::Id],
        diag: &mut Diagnostics,
    ) -> Result<Option<ElementIndex>> {
        let mut current = index;
        for &id in path {
            match self.child_by_id(reader, current, id, diag)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Collect the indices of all (already discoverable) children of `index`.
    pub fn children<R: Read + Seek>(
        &mut self,
        reader: &mut BinaryReader<R>,
        index: ElementIndex,
        diag: &mut Diagnostics,
    ) -> Result<Vec<ElementIndex>> {
        let mut out = Vec::new();
        let mut child = self.first_child(reader, index, diag)?;
        while let Some(c) = child {
            out.push(c);
            child = self.next_sibling(reader, c, diag)?;
        }
        Ok(out)
    }

    /// Read the payload bytes of an element.
    pub fn read_data<R: Read + Seek>(
        &self,
        reader: &mut BinaryReader<R>,
        index: ElementIndex,
    ) -> Result<Vec<u8>> {
        let node = &self.nodes[index];
        reader.seek_to(node.data_offset())?;
        reader.read_bytes(node.data_len as usize)
    }

    fn read_element<R: Read + Seek>(
        &mut self,
        reader: &mut BinaryReader<R>,
        offset: u64,
        bound: u64,
        parent: Option<ElementIndex>,
        diag: &mut Diagnostics,
    ) -> Result<Option<ElementIndex>> {
        if offset >= bound {
            return Ok(None);
        }
        let remaining = bound - offset;
        reader.seek_to(offset)?;
        let header = match F::read_header(reader, remaining)? {
            Some(h) => h,
            None => return Ok(None),
        };

        if header.header_len as u64 > remaining {
            return Err(crate::error::Error::TruncatedData {
                offset,
                declared: header.header_len as u64,
                available: remaining,
            });
        }
        // Clamp declared sizes to the enclosing span; a child cannot leak out
        // of its parent. Clamping is reported, not fatal.
        let max_data = remaining - header.header_len as u64;
        let data_len = match header.data_len {
            Some(declared) if declared > max_data => {
                diag.warn(
                    format!("parsing {} element", F::CONTAINER_NAME),
                    format!(
                        "element {} at offset {} declares {} bytes but only {} remain; size clamped",
                        F::display_id(header.id),
                        offset,
                        declared,
                        max_data
                    ),
                );
                max_data
            }
            Some(declared) => declared,
            None => max_data,
        };

        let node = ElementNode {
            id: header.id,
            start_offset: offset,
            header_len: header.header_len,
            data_len,
            parent,
            is_parent: F::is_parent(&header),
            child_payload_offset: F::child_payload_offset(&header),
            bound,
            first_child: None,
            next_sibling: None,
        };
        self.nodes.push(node);
        Ok(Some(self.nodes.len() - 1))
    }
}
