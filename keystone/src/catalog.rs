use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::debug_log;
use crate::errors::StorageError;
use crate::field::Type;
use crate::heap_file::HeapFile;
use crate::tuple::TupleDesc;

struct Table {
    file: Arc<HeapFile>,
    name: String,
    primary_key: String,
}

struct Tables {
    by_id: HashMap<u32, Table>,
    // insertion order, for "last added wins" name lookups
    order: Vec<u32>,
}

/// The registry of all tables known to the database: id to backing file,
/// name and primary-key column. Names need not be unique; lookups by name
/// resolve to the most recently added table.
pub struct Catalog {
    tables: RwLock<Tables>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            tables: RwLock::new(Tables {
                by_id: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Registers a table under `file.id()`. Re-adding an id replaces the
    /// previous entry.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str, primary_key: &str) {
        let id = file.id();
        debug_log!("[Catalog::add_table] {} -> id {}", name, id);
        let mut tables = self.tables.write().unwrap();
        tables.by_id.insert(
            id,
            Table {
                file,
                name: name.to_string(),
                primary_key: primary_key.to_string(),
            },
        );
        tables.order.retain(|existing| *existing != id);
        tables.order.push(id);
    }

    pub fn file(&self, table_id: u32) -> Result<Arc<HeapFile>, StorageError> {
        self.tables
            .read()
            .unwrap()
            .by_id
            .get(&table_id)
            .map(|t| t.file.clone())
            .ok_or_else(|| StorageError::NotFound(format!("table id {}", table_id)))
    }

    pub fn tuple_desc(&self, table_id: u32) -> Result<TupleDesc, StorageError> {
        Ok(self.file(table_id)?.tuple_desc().clone())
    }

    pub fn table_name(&self, table_id: u32) -> Result<String, StorageError> {
        self.tables
            .read()
            .unwrap()
            .by_id
            .get(&table_id)
            .map(|t| t.name.clone())
            .ok_or_else(|| StorageError::NotFound(format!("table id {}", table_id)))
    }

    pub fn primary_key(&self, table_id: u32) -> Result<String, StorageError> {
        self.tables
            .read()
            .unwrap()
            .by_id
            .get(&table_id)
            .map(|t| t.primary_key.clone())
            .ok_or_else(|| StorageError::NotFound(format!("table id {}", table_id)))
    }

    /// The id of the most recently added table with the given name.
    pub fn table_id(&self, name: &str) -> Result<u32, StorageError> {
        let tables = self.tables.read().unwrap();
        tables
            .order
            .iter()
            .rev()
            .find(|id| tables.by_id.get(*id).is_some_and(|t| t.name == name))
            .copied()
            .ok_or_else(|| StorageError::NotFound(format!("table named {}", name)))
    }

    /// All registered table ids, oldest first.
    pub fn table_ids(&self) -> Vec<u32> {
        self.tables.read().unwrap().order.clone()
    }

    /// Drops every table from the registry.
    pub fn clear(&self) {
        let mut tables = self.tables.write().unwrap();
        tables.by_id.clear();
        tables.order.clear();
    }

    /// Loads a schema description file: one table per line, in the form
    /// `name(colName type [pk], ...)` with `type` one of `int`/`string`,
    /// case-insensitive. Each table's data lives next to the schema file as
    /// `<name>.dat`. Returns the `(id, name)` pairs of the loaded tables.
    pub fn load_schema<P: AsRef<Path>>(
        &self,
        path: P,
        page_size: usize,
    ) -> Result<Vec<(u32, String)>, StorageError> {
        let path_ref = path.as_ref();
        let base = path_ref.parent().unwrap_or_else(|| Path::new("."));
        let text = std::fs::read_to_string(path_ref)?;
        let mut loaded = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let open = line.find('(').ok_or_else(|| {
                StorageError::Unsupported(format!("invalid catalog entry: {}", line))
            })?;
            let close = line.rfind(')').ok_or_else(|| {
                StorageError::Unsupported(format!("invalid catalog entry: {}", line))
            })?;
            let name = line[..open].trim();
            if name.is_empty() || close < open {
                return Err(StorageError::Unsupported(format!(
                    "invalid catalog entry: {}",
                    line
                )));
            }

            let mut items = Vec::new();
            let mut primary_key = String::new();
            for col in line[open + 1..close].split(',') {
                let mut words = col.split_whitespace();
                let col_name = words.next().ok_or_else(|| {
                    StorageError::Unsupported(format!("invalid catalog entry: {}", line))
                })?;
                let type_word = words.next().ok_or_else(|| {
                    StorageError::Unsupported(format!("missing type for column {}", col_name))
                })?;
                let ty = match type_word.to_ascii_lowercase().as_str() {
                    "int" => Type::Int,
                    "string" => Type::String,
                    other => {
                        return Err(StorageError::Unsupported(format!(
                            "unknown type {}",
                            other
                        )))
                    }
                };
                if let Some(annotation) = words.next() {
                    if annotation != "pk" {
                        return Err(StorageError::Unsupported(format!(
                            "unknown annotation {}",
                            annotation
                        )));
                    }
                    primary_key = col_name.to_string();
                }
                items.push((ty, col_name.to_string()));
            }

            let td = TupleDesc::new(items);
            let file = Arc::new(HeapFile::open(
                base.join(format!("{}.dat", name)),
                td,
                page_size,
            )?);
            let id = file.id();
            self.add_table(file, name, &primary_key);
            loaded.push((id, name.to_string()));
        }

        Ok(loaded)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
