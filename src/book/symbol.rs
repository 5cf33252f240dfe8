//! Symbol master: static reference data for each tradable instrument (§3,
//! §6). Loaded at startup from a CSV view, indexed by both id and name;
//! malformed lines are skipped with a warning rather than aborting load,
//! and a missing file installs a small built-in default set.

use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentType {
    Equity,
    Future,
    Option,
    Index,
}

impl InstrumentType {
    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "EQUITY" => Some(Self::Equity),
            "FUTURE" => Some(Self::Future),
            "OPTION" => Some(Self::Option),
            "INDEX" => Some(Self::Index),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolEntry {
    pub symbol_id: u32,
    pub symbol_name: String,
    pub isin: String,
    pub instrument_type: InstrumentType,
    pub tick_size: f64,
    pub lot_size: u32,
    pub upper_circuit: f64,
    pub lower_circuit: f64,
}

/// Indexed by both `symbol_id` and `symbol_name`.
pub struct SymbolMaster {
    by_id: HashMap<u32, SymbolEntry>,
    by_name: HashMap<String, u32>,
    pub used_default_set: bool,
}

impl SymbolMaster {
    pub fn empty() -> Self {
        Self { by_id: HashMap::new(), by_name: HashMap::new(), used_default_set: false }
    }

    fn insert(&mut self, entry: SymbolEntry) {
        self.by_name.insert(entry.symbol_name.clone(), entry.symbol_id);
        self.by_id.insert(entry.symbol_id, entry);
    }

    pub fn get_by_id(&self, symbol_id: u32) -> Option<&SymbolEntry> {
        self.by_id.get(&symbol_id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&SymbolEntry> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// A handful of liquid NSE names, installed when no CSV file is
    /// available. Never fatal — a missing symbol master is not a startup
    /// blocker.
    pub fn default_set() -> Self {
        let mut master = Self::empty();
        master.used_default_set = true;
        for (id, name, isin, tick, lot) in [
            (1u32, "RELIANCE", "INE002A01018", 0.05, 1u32),
            (2, "TCS", "INE467B01029", 0.05, 1),
            (3, "INFY", "INE009A01021", 0.05, 1),
            (4, "HDFCBANK", "INE040A01034", 0.05, 1),
            (5, "NIFTY50", "INF1J1Y01017", 0.05, 50),
        ] {
            master.insert(SymbolEntry {
                symbol_id: id,
                symbol_name: name.to_string(),
                isin: isin.to_string(),
                instrument_type: if name == "NIFTY50" { InstrumentType::Index } else { InstrumentType::Equity },
                tick_size: tick,
                lot_size: lot,
                upper_circuit: 0.0,
                lower_circuit: 0.0,
            });
        }
        master
    }

    /// Loads `symbol_id,symbol_name,isin,type,tick_size,lot_size,upper_circuit,lower_circuit`
    /// from a CSV reader. Malformed lines are skipped with a warning.
    pub fn load_csv<R: std::io::Read>(reader: R) -> Self {
        let mut master = Self::empty();
        let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        for record in csv_reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "malformed symbol master line");
                    continue;
                }
            };
            match Self::parse_record(&record) {
                Some(entry) => master.insert(entry),
                None => warn!(line = ?record, "skipping malformed symbol master row"),
            }
        }
        master
    }

    fn parse_record(record: &csv::StringRecord) -> Option<SymbolEntry> {
        if record.len() < 8 {
            return None;
        }
        Some(SymbolEntry {
            symbol_id: record.get(0)?.trim().parse().ok()?,
            symbol_name: record.get(1)?.trim().to_string(),
            isin: record.get(2)?.trim().to_string(),
            instrument_type: InstrumentType::parse(record.get(3)?)?,
            tick_size: record.get(4)?.trim().parse().ok()?,
            lot_size: record.get(5)?.trim().parse().ok()?,
            upper_circuit: record.get(6)?.trim().parse().ok()?,
            lower_circuit: record.get(7)?.trim().parse().ok()?,
        })
    }

    /// Loads from a file path, falling back to the default set if the file
    /// does not exist — missing symbol master is non-fatal per §6.
    pub fn load_or_default(path: &str) -> Self {
        match std::fs::File::open(path) {
            Ok(file) => Self::load_csv(file),
            Err(_) => {
                warn!(path, "symbol master file missing, using built-in default set");
                Self::default_set()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set() {
        let master = SymbolMaster::default_set();
        assert!(master.used_default_set);
        assert!(master.get_by_name("RELIANCE").is_some());
        assert!(master.get_by_id(1).is_some());
    }

    #[test]
    fn test_load_csv_skips_malformed() {
        let csv_data = "symbol_id,symbol_name,isin,type,tick_size,lot_size,upper_circuit,lower_circuit\n\
                         1,RELIANCE,INE002A01018,EQUITY,0.05,1,3000,2500\n\
                         not_a_number,BAD,ISIN,EQUITY,0.05,1,0,0\n";
        let master = SymbolMaster::load_csv(csv_data.as_bytes());
        assert_eq!(master.len(), 1);
        assert!(master.get_by_name("RELIANCE").is_some());
    }
}
