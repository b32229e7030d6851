//! Snapshot persistence for [`Database`].
//!
//! A snapshot is one file, `catalog.snap`, laid out as
//!
//! ```text
//! magic (8) | crc32 of payload (4, LE) | payload length (8, LE) | payload
//! ```
//!
//! where the payload is the bincode encoding of the whole catalog. Writes
//! go to a temporary file that is renamed into place, so a crash leaves
//! either the old snapshot or the new one.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::db::{Catalog, ColumnData, Database, IndexData};
use crate::error::{Error, Result};
use crate::postings::Postings;
use crate::table::TableData;
use crate::tokenizer::TokenizerKind;
use crate::types::{IndexFlags, ObjectId, ObjectInfo, ObjectKind, RecordId};

const MAGIC: &[u8; 8] = b"INVCOL01";
const FILE_NAME: &str = "catalog.snap";
const HEADER_LEN: usize = 8 + 4 + 8;

#[derive(Serialize, Deserialize)]
struct CatalogImage {
    next_id: ObjectId,
    objects: Vec<ObjectInfo>,
    tables: Vec<TableImage>,
    columns: Vec<ColumnImage>,
    indexes: Vec<IndexImage>,
}

#[derive(Serialize, Deserialize)]
struct TableImage {
    id: ObjectId,
    next_record: RecordId,
    records: Vec<(RecordId, Option<String>)>,
}

/// Values are stored as JSON text; bincode cannot decode self-describing values.
#[derive(Serialize, Deserialize)]
struct ColumnImage {
    id: ObjectId,
    values: Vec<(RecordId, String)>,
}

#[derive(Serialize, Deserialize)]
struct IndexImage {
    id: ObjectId,
    lexicon: ObjectId,
    range: ObjectId,
    flags: IndexFlags,
    tokenizer: TokenizerKind,
    sources: Vec<ObjectId>,
    /// (term, record, section, positions)
    postings: Vec<(RecordId, RecordId, u32, Vec<u32>)>,
}

impl Database {
    /// Write a snapshot of every user object into `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let image = self.catalog.read().image()?;
        let payload = bincode::serialize(&image)?;

        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        buf.extend_from_slice(&payload);

        let tmp = dir.join(format!("{FILE_NAME}.tmp"));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&buf)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, dir.join(FILE_NAME))?;
        log::info!(
            "saved snapshot to {} ({} objects, {} bytes)",
            dir.display(),
            image.objects.len(),
            buf.len()
        );
        Ok(())
    }

    /// Load a database from a snapshot written by [`Database::save`].
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let raw = fs::read(dir.join(FILE_NAME))?;
        if raw.len() < HEADER_LEN || &raw[..8] != MAGIC {
            return Err(Error::Snapshot("not a snapshot file".into()));
        }
        let crc = u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]);
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&raw[12..HEADER_LEN]);
        let len = u64::from_le_bytes(len_bytes) as usize;

        let payload = &raw[HEADER_LEN..];
        if payload.len() != len {
            return Err(Error::Snapshot(format!(
                "truncated payload: expected {len} bytes, found {}",
                payload.len()
            )));
        }
        if crc32fast::hash(payload) != crc {
            return Err(Error::Snapshot("checksum mismatch".into()));
        }

        let image: CatalogImage = bincode::deserialize(payload)?;
        let db = Database::new();
        {
            let mut cat = db.catalog.write();
            cat.restore(image)?;
            for info in cat.objects.values() {
                if let (Some(name), ObjectKind::Table { .. } | ObjectKind::Column { .. } | ObjectKind::Index { .. }) =
                    (&info.name, &info.kind)
                {
                    db.names.insert(name.clone(), info.id);
                }
            }
        }
        log::info!("opened snapshot from {}", dir.display());
        Ok(db)
    }
}

impl Catalog {
    fn image(&self) -> Result<CatalogImage> {
        let objects = self
            .objects
            .values()
            .filter(|o| !matches!(o.kind, ObjectKind::Type(_)))
            .cloned()
            .collect();

        let tables = self
            .tables
            .iter()
            .map(|(id, t)| TableImage {
                id: *id,
                next_record: t.next_id(),
                records: t.records(),
            })
            .collect();

        let mut columns = Vec::with_capacity(self.columns.len());
        for (id, column) in &self.columns {
            let mut values = Vec::with_capacity(column.values.len());
            for (record, value) in &column.values {
                values.push((*record, serde_json::to_string(value).map_err(|e| Error::Snapshot(e.to_string()))?));
            }
            columns.push(ColumnImage { id: *id, values });
        }

        let indexes = self
            .indexes
            .iter()
            .map(|(id, index)| IndexImage {
                id: *id,
                lexicon: index.lexicon,
                range: index.range,
                flags: index.flags,
                tokenizer: index.tokenizer,
                sources: index.sources.clone(),
                postings: index
                    .postings
                    .iter()
                    .flat_map(|(term, list)| {
                        list.entries()
                            .map(move |(record, section, positions)| (term, record, section, positions.to_vec()))
                    })
                    .collect(),
            })
            .collect();

        Ok(CatalogImage {
            next_id: self.next_id,
            objects,
            tables,
            columns,
            indexes,
        })
    }

    fn restore(&mut self, image: CatalogImage) -> Result<()> {
        self.next_id = image.next_id;
        for info in image.objects {
            self.objects.insert(info.id, info);
        }

        for table in image.tables {
            let kind = match self.objects.get(&table.id).map(|o| &o.kind) {
                Some(ObjectKind::Table { kind, .. }) => *kind,
                _ => return Err(Error::Snapshot(format!("table #{} has no catalog entry", table.id))),
            };
            self.tables
                .insert(table.id, TableData::restore(kind, table.next_record, table.records));
        }

        for column in image.columns {
            let mut data = ColumnData::default();
            for (record, text) in column.values {
                let value = serde_json::from_str(&text).map_err(|e| Error::Snapshot(e.to_string()))?;
                data.values.insert(record, value);
            }
            self.columns.insert(column.id, data);
        }

        for index in image.indexes {
            let mut postings = Postings::default();
            for (term, record, section, positions) in index.postings {
                for position in positions {
                    postings.add(term, record, section, position);
                }
            }
            self.indexes.insert(
                index.id,
                IndexData {
                    lexicon: index.lexicon,
                    range: index.range,
                    flags: index.flags,
                    tokenizer: index.tokenizer,
                    sources: index.sources,
                    postings,
                },
            );
        }
        Ok(())
    }
}
