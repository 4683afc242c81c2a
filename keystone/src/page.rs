use serde::{Deserialize, Serialize};

use crate::errors::StorageError;
use crate::transaction::TransactionId;
use crate::tuple::{RecordId, Tuple, TupleDesc};
use crate::debug_log;

/// Identifies one page of one table: `(table_id, page_no)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeapPageId {
    pub table_id: u32,
    pub page_no: usize,
}

impl HeapPageId {
    pub fn new(table_id: u32, page_no: usize) -> Self {
        HeapPageId { table_id, page_no }
    }
}

/// The in-memory image of one slotted heap page.
///
/// On disk a page is `[header bitmap][slot 0 .. slot N-1][zero padding]`.
/// Bit `i % 8` of header byte `i / 8` says whether slot `i` holds a tuple.
/// A used slot is the concatenated field encodings in schema order; an
/// unused slot is all zeroes. `N = (page_size * 8) / (tuple_size * 8 + 1)`
/// so that N slots and N header bits fit together.
#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: HeapPageId,
    td: TupleDesc,
    page_size: usize,
    num_slots: usize,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirtier: Option<TransactionId>,
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Parses a page from its on-disk bytes. `data` must be exactly
    /// `page_size` long. The freshly parsed bytes become the page's
    /// before-image.
    pub fn new(
        pid: HeapPageId,
        data: &[u8],
        td: TupleDesc,
        page_size: usize,
    ) -> Result<Self, StorageError> {
        if data.len() != page_size {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("page image is {} bytes, expected {}", data.len(), page_size),
            )));
        }
        let num_slots = Self::slots_per_page(page_size, td.size());
        let header_len = Self::header_len(num_slots);
        let header = data[..header_len].to_vec();
        let tuple_size = td.size();

        let mut page = HeapPage {
            pid,
            td,
            page_size,
            num_slots,
            header,
            tuples: Vec::with_capacity(num_slots),
            dirtier: None,
            before_image: data.to_vec(),
        };

        for slot in 0..num_slots {
            if !page.is_slot_used(slot) {
                page.tuples.push(None);
                continue;
            }
            let start = header_len + slot * tuple_size;
            let mut fields = Vec::with_capacity(page.td.num_fields());
            let mut offset = start;
            for i in 0..page.td.num_fields() {
                let ty = page.td.field_type(i)?;
                fields.push(ty.parse(&data[offset..offset + ty.len()])?);
                offset += ty.len();
            }
            let mut tuple = Tuple::new(page.td.clone(), fields)?;
            tuple.set_record_id(Some(RecordId::new(pid, slot)));
            page.tuples.push(Some(tuple));
        }

        Ok(page)
    }

    /// Creates an empty page image: all slots unused, all bytes zero.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    /// How many fixed-width tuples fit on a page alongside their header bits.
    pub fn slots_per_page(page_size: usize, tuple_size: usize) -> usize {
        (page_size * 8) / (tuple_size * 8 + 1)
    }

    fn header_len(num_slots: usize) -> usize {
        num_slots.div_ceil(8)
    }

    pub fn id(&self) -> HeapPageId {
        self.pid
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// The number of empty slots left on this page.
    pub fn unused_slots(&self) -> usize {
        (0..self.num_slots)
            .filter(|slot| !self.is_slot_used(*slot))
            .count()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        let byte = self.header[slot / 8];
        (byte >> (slot % 8)) & 1 != 0
    }

    /// Flips one header bit; no other page state is touched.
    pub fn mark_slot_used(&mut self, slot: usize, used: bool) {
        let mask = 1u8 << (slot % 8);
        if used {
            self.header[slot / 8] |= mask;
        } else {
            self.header[slot / 8] &= !mask;
        }
    }

    /// Stores `t` in the first unused slot and stamps its record id. On a
    /// full page the tuple is left untouched so the caller can try the next
    /// page.
    pub fn insert_tuple(&mut self, t: &mut Tuple) -> Result<RecordId, StorageError> {
        if *t.tuple_desc() != self.td {
            return Err(StorageError::SchemaMismatch(format!(
                "tuple [{}] does not fit page schema [{}]",
                t.tuple_desc(),
                self.td
            )));
        }
        let slot = (0..self.num_slots)
            .find(|slot| !self.is_slot_used(*slot))
            .ok_or(StorageError::PageFull)?;
        let rid = RecordId::new(self.pid, slot);
        t.set_record_id(Some(rid));
        self.tuples[slot] = Some(t.clone());
        self.mark_slot_used(slot, true);
        debug_log!("[HeapPage::insert_tuple] page {:?} slot {}", self.pid, slot);
        Ok(rid)
    }

    /// Removes the lowest-numbered used slot whose field values equal `t`'s.
    pub fn delete_tuple(&mut self, t: &Tuple) -> Result<(), StorageError> {
        if *t.tuple_desc() != self.td {
            return Err(StorageError::SchemaMismatch(format!(
                "tuple [{}] does not fit page schema [{}]",
                t.tuple_desc(),
                self.td
            )));
        }
        let slot = self
            .tuples
            .iter()
            .position(|stored| stored.as_ref().is_some_and(|s| s.fields_eq(t)))
            .ok_or_else(|| {
                StorageError::NotFound(format!("tuple [{}] is not on page {:?}", t, self.pid))
            })?;
        self.tuples[slot] = None;
        self.mark_slot_used(slot, false);
        debug_log!("[HeapPage::delete_tuple] page {:?} slot {}", self.pid, slot);
        Ok(())
    }

    /// The used-slot tuples in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().filter_map(|t| t.as_ref())
    }

    /// The byte-exact on-disk encoding of this page.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.page_size);
        out.extend_from_slice(&self.header);
        let tuple_size = self.td.size();
        for stored in &self.tuples {
            match stored {
                Some(t) => t.serialize_into(&mut out),
                None => out.extend(std::iter::repeat(0u8).take(tuple_size)),
            }
        }
        out.resize(self.page_size, 0);
        out
    }

    pub fn mark_dirty(&mut self, dirtier: Option<TransactionId>) {
        self.dirtier = dirtier;
    }

    /// The transaction that last dirtied this page, or `None` when clean.
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    /// Snapshots the current contents as the page's before-image.
    pub fn set_before_image(&mut self) {
        self.before_image = self.serialize();
    }

    /// The raw before-image bytes, as last snapshotted.
    pub fn before_image_data(&self) -> &[u8] {
        &self.before_image
    }

    /// Reconstructs the page as it looked when the before-image was taken.
    pub fn before_image(&self) -> Result<HeapPage, StorageError> {
        HeapPage::new(self.pid, &self.before_image, self.td.clone(), self.page_size)
    }
}
