use fxhash::FxHashMap;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::constants::{
    DATA_DIR_NAME, DEFOCUS_KEY, DOSE_KEY, METERS_TO_MICROMETERS, SIDECAR_EXTENSION,
    SIDECAR_STRIP,
};
use super::error::SidecarError;
use super::micrograph::Catalog;

/// The values of interest from one metadata sidecar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SidecarValues {
    pub raw_dose: f64,
    /// Micrometers
    pub applied_defocus: f64,
}

/// Which part of a key/value pair the reader is inside of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairField {
    Key,
    Value,
}

/// Parse the EPU metadata XML from a reader.
///
/// EPU stores instrument settings as a list of `<Key>`/`<Value>` pairs. The pairs are
/// looked up by key name, so their position in the document does not matter. The first
/// occurrence of a key wins.
pub fn parse_sidecar<R: BufRead>(source: R) -> Result<SidecarValues, SidecarError> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);

    let mut pairs: FxHashMap<String, String> = FxHashMap::default();
    let mut field: Option<PairField> = None;
    let mut current_key: Option<String> = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                field = match e.local_name().as_ref() {
                    b"Key" => Some(PairField::Key),
                    b"Value" if current_key.is_some() => Some(PairField::Value),
                    _ => None,
                };
            }
            Event::Text(e) => match field {
                Some(PairField::Key) => current_key = Some(e.unescape()?.trim().to_string()),
                Some(PairField::Value) => {
                    let value = e.unescape()?.trim().to_string();
                    if let Some(key) = current_key.take() {
                        pairs.entry(key).or_insert(value);
                    }
                }
                None => (),
            },
            Event::End(e) => {
                field = None;
                // A pair without a value must not leak its key into the next pair
                if e.local_name().as_ref() == b"Value" {
                    current_key = None;
                }
            }
            Event::Eof => break,
            _ => (),
        }
        buf.clear();
    }

    let raw_dose = read_number(&pairs, DOSE_KEY)?;
    if raw_dose < 0.0 {
        return Err(SidecarError::BadValue(DOSE_KEY, raw_dose.to_string()));
    }
    let applied_defocus = read_number(&pairs, DEFOCUS_KEY)? * METERS_TO_MICROMETERS;
    Ok(SidecarValues {
        raw_dose,
        applied_defocus,
    })
}

fn read_number(pairs: &FxHashMap<String, String>, key: &'static str) -> Result<f64, SidecarError> {
    let text = pairs.get(key).ok_or(SidecarError::MissingField(key))?;
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(SidecarError::BadValue(key, text.clone())),
    }
}

/// Parse the sidecar at path. The file is closed before returning, on success or failure.
pub fn read_sidecar(path: &Path) -> Result<SidecarValues, SidecarError> {
    let file = File::open(path)?;
    parse_sidecar(BufReader::new(file))
}

/// Name of the sidecar (without extension) belonging to a micrograph
pub fn sidecar_stem(micrograph_name: &str) -> String {
    micrograph_name.replace(SIDECAR_STRIP, "")
}

/// Counters of a metadata enrichment pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub found: usize,
    pub missing: usize,
    pub failed: usize,
}

/// MetadataEnricher attaches raw dose and applied defocus from the sidecars to the catalog.
///
/// All sidecars under `<root>/*/Data/` are indexed once by file stem. If a stem occurs in
/// more than one grid square, the lexicographically first path is used.
#[derive(Debug)]
pub struct MetadataEnricher {
    sidecars: FxHashMap<String, Vec<PathBuf>>,
}

impl MetadataEnricher {
    /// Index the sidecars under a raw data root
    pub fn new(root: &Path) -> Result<Self, SidecarError> {
        let pattern = format!(
            "{}/*/{}/*.{}",
            glob::Pattern::escape(&root.to_string_lossy()),
            DATA_DIR_NAME,
            SIDECAR_EXTENSION
        );
        let mut sidecars: FxHashMap<String, Vec<PathBuf>> = FxHashMap::default();
        for item in glob::glob(&pattern)? {
            let path = match item {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("Could not read {}: {}", e.path().display(), e.error());
                    continue;
                }
            };
            if let Some(stem) = path.file_stem() {
                sidecars
                    .entry(stem.to_string_lossy().to_string())
                    .or_default()
                    .push(path);
            }
        }
        for paths in sidecars.values_mut() {
            paths.sort();
        }
        log::info!("Indexed {} metadata sidecars", sidecars.len());
        Ok(Self { sidecars })
    }

    /// Find the sidecar of a micrograph
    pub fn find_sidecar(&self, micrograph_name: &str) -> Option<&Path> {
        let stem = sidecar_stem(micrograph_name);
        let candidates = self.sidecars.get(&stem)?;
        if candidates.len() > 1 {
            log::warn!(
                "Found {} sidecars named {}.{}; using {}",
                candidates.len(),
                stem,
                SIDECAR_EXTENSION,
                candidates[0].display()
            );
        }
        candidates.first().map(|p| p.as_path())
    }

    /// Fill in raw dose and applied defocus for every record.
    ///
    /// Missing or unreadable sidecars leave both fields absent for that record.
    pub fn enrich(&self, catalog: &mut Catalog) -> EnrichSummary {
        let mut summary = EnrichSummary::default();
        for record in catalog.records.iter_mut() {
            let Some(path) = self.find_sidecar(&record.name) else {
                log::warn!("No matching XML file found for micrograph {}", record.name);
                record.raw_dose = None;
                record.applied_defocus = None;
                summary.missing += 1;
                continue;
            };
            match read_sidecar(path) {
                Ok(values) => {
                    record.raw_dose = Some(values.raw_dose);
                    record.applied_defocus = Some(values.applied_defocus);
                    summary.found += 1;
                }
                Err(e) => {
                    log::warn!("Error reading XML file {}: {}", path.display(), e);
                    record.raw_dose = None;
                    record.applied_defocus = None;
                    summary.failed += 1;
                }
            }
        }
        log::info!(
            "Metadata attached to {} micrographs ({} without sidecar, {} unreadable)",
            summary.found,
            summary.missing,
            summary.failed
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn make_sidecar(dose: &str, defocus: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<MicroscopeImage xmlns:i="http://www.w3.org/2001/XMLSchema-instance">
  <uniqueID>abc</uniqueID>
  <name>FoilHole</name>
  <CustomData xmlns:a="http://schemas.microsoft.com/2003/10/Serialization/Arrays">
    <a:KeyValueOfstringanyType>
      <a:Key>DoseOnCamera</a:Key>
      <a:Value i:type="b:double" xmlns:b="http://www.w3.org/2001/XMLSchema">{dose}</a:Value>
    </a:KeyValueOfstringanyType>
    <a:KeyValueOfstringanyType>
      <a:Key>Detectors[EF-Falcon].ExposureTime</a:Key>
      <a:Value i:type="b:double" xmlns:b="http://www.w3.org/2001/XMLSchema">2.5</a:Value>
    </a:KeyValueOfstringanyType>
    <a:KeyValueOfstringanyType>
      <a:Key>AppliedDefocus</a:Key>
      <a:Value i:type="b:double" xmlns:b="http://www.w3.org/2001/XMLSchema">{defocus}</a:Value>
    </a:KeyValueOfstringanyType>
  </CustomData>
</MicroscopeImage>
"#
        )
    }

    #[test]
    fn test_parse_named_fields() {
        let xml = make_sidecar("42.5", "-1.5E-06");
        let values = parse_sidecar(Cursor::new(xml)).unwrap();
        assert_eq!(values.raw_dose, 42.5);
        assert!((values.applied_defocus + 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let xml = r#"<Root><Data>
            <Pair><Key>AppliedDefocus</Key><Value>-2E-06</Value></Pair>
            <Pair><Key>Other</Key></Pair>
            <Pair><Key>DoseOnCamera</Key><Value>10</Value></Pair>
        </Data></Root>"#;
        let values = parse_sidecar(Cursor::new(xml)).unwrap();
        assert_eq!(values.raw_dose, 10.0);
        assert!((values.applied_defocus + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_and_bad_fields() {
        let xml = r#"<Root><Pair><Key>DoseOnCamera</Key><Value>10</Value></Pair></Root>"#;
        assert!(matches!(
            parse_sidecar(Cursor::new(xml)),
            Err(SidecarError::MissingField(DEFOCUS_KEY))
        ));
        let xml = make_sidecar("lots", "-1E-06");
        assert!(matches!(
            parse_sidecar(Cursor::new(xml)),
            Err(SidecarError::BadValue(DOSE_KEY, _))
        ));
    }

    #[test]
    fn test_non_finite_and_negative_values() {
        for dose in ["NaN", "inf", "-inf", "-10"] {
            assert!(
                matches!(
                    parse_sidecar(Cursor::new(make_sidecar(dose, "-1E-06"))),
                    Err(SidecarError::BadValue(DOSE_KEY, _))
                ),
                "dose {dose} was accepted"
            );
        }
        assert!(matches!(
            parse_sidecar(Cursor::new(make_sidecar("10", "NaN"))),
            Err(SidecarError::BadValue(DEFOCUS_KEY, _))
        ));
        // Zero dose is still a reading
        assert_eq!(
            parse_sidecar(Cursor::new(make_sidecar("0", "-1E-06")))
                .unwrap()
                .raw_dose,
            0.0
        );
    }

    #[test]
    fn test_duplicate_stem_uses_first_path() {
        let dir = TempDir::new().unwrap();
        let stem = "FoilHole_1_Data_2_3_20240101_120000";
        for (grid_square, dose) in [("GridSquare_2", "20"), ("GridSquare_1", "10")] {
            let data = dir.path().join(grid_square).join(DATA_DIR_NAME);
            fs::create_dir_all(&data).unwrap();
            fs::write(data.join(format!("{stem}.xml")), make_sidecar(dose, "-1E-06")).unwrap();
        }
        let enricher = MetadataEnricher::new(dir.path()).unwrap();
        let name = format!("{stem}_Fractions");
        let path = enricher.find_sidecar(&name).unwrap();
        assert!(path.starts_with(dir.path().join("GridSquare_1")));

        let mut catalog = Catalog::from_ordered([(name.as_str(), "GridSquare_2", None)]);
        let summary = enricher.enrich(&mut catalog);
        assert_eq!(summary.found, 1);
        assert_eq!(catalog.records[0].raw_dose, Some(10.0));
    }

    #[test]
    fn test_malformed_document() {
        let xml = "<Root><Pair><Key>DoseOnCamera</Key><Value>10</Value></Oops></Root>";
        assert!(parse_sidecar(Cursor::new(xml)).is_err());
    }

    #[test]
    fn test_sidecar_stem() {
        assert_eq!(
            sidecar_stem("FoilHole_1_Data_2_3_20240101_120000_Fractions"),
            "FoilHole_1_Data_2_3_20240101_120000"
        );
    }
}
