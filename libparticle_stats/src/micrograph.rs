use fxhash::FxHashMap;
use time::PrimitiveDateTime;

/// One row of the statistics table, one per movie file.
///
/// Identity fields (name, indices, grid square) are set once when the catalog is
/// built. The remaining fields are filled in by the later pipeline stages.
#[derive(Debug, Clone, PartialEq)]
pub struct MicrographRecord {
    pub name: String,
    pub sequence_index: usize,
    pub grid_square_name: String,
    pub grid_square_index: usize,
    pub particle_count: u64,
    /// None if the movie name carries no valid timestamp
    pub acquired_at: Option<PrimitiveDateTime>,
    /// Staging value from the sidecar; only exposed after normalization
    pub raw_dose: Option<f64>,
    pub percent_transmission: Option<f64>,
    /// Micrometers
    pub applied_defocus: Option<f64>,
}

impl MicrographRecord {
    pub fn new(
        name: &str,
        sequence_index: usize,
        grid_square_name: &str,
        grid_square_index: usize,
        acquired_at: Option<PrimitiveDateTime>,
    ) -> Self {
        Self {
            name: name.to_string(),
            sequence_index,
            grid_square_name: grid_square_name.to_string(),
            grid_square_index,
            particle_count: 0,
            acquired_at,
            raw_dose: None,
            percent_transmission: None,
            applied_defocus: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.particle_count == 0
    }
}

/// Mapping of grid square name to its 1-based index.
///
/// Indices are handed out in insertion order, so inserting names in temporal order
/// gives the first-appearance numbering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridSquareIndex {
    names: Vec<String>,
    lookup: FxHashMap<String, usize>,
}

impl GridSquareIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the index of a grid square, assigning the next index if it is new
    pub fn get_or_insert(&mut self, name: &str) -> usize {
        if let Some(index) = self.lookup.get(name) {
            return *index;
        }
        self.names.push(name.to_string());
        let index = self.names.len();
        self.lookup.insert(name.to_string(), index);
        index
    }

    pub fn get_index(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    pub fn get_name(&self, index: usize) -> Option<&str> {
        if index == 0 {
            return None;
        }
        self.names.get(index - 1).map(|n| n.as_str())
    }

    /// Iterate over (index, name) in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(idx, name)| (idx + 1, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// The per-micrograph table for one run, ordered by sequence index
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub records: Vec<MicrographRecord>,
    pub grid_squares: GridSquareIndex,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MicrographRecord> {
        self.records.iter()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&MicrographRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Build a catalog from (name, grid square, timestamp) entries which are already
    /// in temporal order. Assigns sequence and grid square indices.
    pub fn from_ordered<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str, Option<PrimitiveDateTime>)>,
    {
        let mut catalog = Catalog::default();
        for (idx, (name, grid_square, acquired_at)) in entries.into_iter().enumerate() {
            let grid_square_index = catalog.grid_squares.get_or_insert(grid_square);
            catalog.records.push(MicrographRecord::new(
                name,
                idx + 1,
                grid_square,
                grid_square_index,
                acquired_at,
            ));
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_appearance_indexing() {
        let catalog = Catalog::from_ordered([
            ("mic_a1", "A", None),
            ("mic_a2", "A", None),
            ("mic_b1", "B", None),
        ]);
        assert_eq!(catalog.grid_squares.get_index("A"), Some(1));
        assert_eq!(catalog.grid_squares.get_index("B"), Some(2));
        let sequence: Vec<usize> = catalog.iter().map(|r| r.sequence_index).collect();
        assert_eq!(sequence, vec![1, 2, 3]);
        let squares: Vec<usize> = catalog.iter().map(|r| r.grid_square_index).collect();
        assert_eq!(squares, vec![1, 1, 2]);
    }

    #[test]
    fn test_grid_square_lookup_by_index() {
        let mut index = GridSquareIndex::new();
        assert_eq!(index.get_or_insert("GridSquare_9"), 1);
        assert_eq!(index.get_or_insert("GridSquare_3"), 2);
        assert_eq!(index.get_or_insert("GridSquare_9"), 1);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get_name(2), Some("GridSquare_3"));
        assert_eq!(index.get_name(0), None);
        assert_eq!(index.get_name(3), None);
    }
}
