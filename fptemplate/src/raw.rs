//! Raw pair-set representation.

use crate::error::TemplateError;
use crate::find_pairs::PairSet;
use crate::types::QuantizedPair;

/// The raw representation is the pair set itself.
pub fn build(pairs: &PairSet) -> PairSet {
    pairs.clone()
}

/// Writes one `L a_i a_j t_i t_j` line per pair.
pub fn serialize(pairs: &PairSet) -> String {
    let mut record = String::with_capacity(pairs.len() * 20);
    for pair in pairs {
        record.push_str(&pair.to_string());
        record.push('\n');
    }
    record
}

/// Reads a record written by [`serialize`]. Angles keep only their integer part.
pub fn deserialize(record: &str) -> Result<PairSet, TemplateError> {
    let mut pairs = PairSet::new();
    for (number, line) in record.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        pairs.insert(parse_line(line).map_err(|reason| {
            TemplateError::InvalidInput(format!("raw record line {}: {}", number + 1, reason))
        })?);
    }
    Ok(pairs)
}

fn parse_line(line: &str) -> Result<QuantizedPair, String> {
    let columns: Vec<&str> = line.split_whitespace().collect();
    let (length, alpha_i, alpha_j, kind_i, kind_j) =
        if let &[length, alpha_i, alpha_j, kind_i, kind_j] = columns.as_slice() {
            (length, alpha_i, alpha_j, kind_i, kind_j)
        } else {
            return Err(format!("expected 5 columns, found {}", columns.len()));
        };

    let integer = |column: &str| -> Result<u32, String> {
        let whole = column.split('.').next().unwrap_or(column);
        whole
            .parse::<u32>()
            .map_err(|_| format!("invalid feature value {:?}", column))
    };
    let code = |column: &str| -> Result<u8, String> {
        column
            .parse::<u8>()
            .map_err(|_| format!("invalid type code {:?}", column))
    };

    QuantizedPair::from_features(
        integer(length)?,
        integer(alpha_i)?,
        integer(alpha_j)?,
        code(kind_i)?,
        code(kind_j)?,
    )
    .map_err(|err| err.to_string())
}

/// Fraction of query pairs that have a structurally equal reference pair.
///
/// Every query pair is compared against every reference pair.
pub fn match_pairs(reference: &PairSet, query: &PairSet) -> Result<f64, TemplateError> {
    if query.is_empty() {
        return Err(TemplateError::DivisionByZero);
    }

    let mut matches = 0usize;
    for q in query {
        for r in reference {
            if q.length == r.length
                && q.alpha_i == r.alpha_i
                && q.alpha_j == r.alpha_j
                && q.kind_i == r.kind_i
                && q.kind_j == r.kind_j
            {
                matches += 1;
            }
        }
    }

    Ok(matches as f64 / query.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MinutiaKind::{Bifurcation, Ending};

    fn pairs() -> PairSet {
        vec![
            QuantizedPair::new(4, 3, 17, Ending, Bifurcation),
            QuantizedPair::new(4, 13, 7, Bifurcation, Ending),
            QuantizedPair::new(57, 0, 19, Ending, Ending),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn record_round_trip() {
        let original = pairs();
        assert_eq!(deserialize(&serialize(&original)).unwrap(), original);
    }

    #[test]
    fn reads_integer_and_fractional_angles() {
        let parsed = deserialize("4 3.000 17.999 0 1\n\n4 13 7 1 0\n").unwrap();
        assert!(parsed.contains(&QuantizedPair::new(4, 3, 17, Ending, Bifurcation)));
        assert!(parsed.contains(&QuantizedPair::new(4, 13, 7, Bifurcation, Ending)));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(
            deserialize("4 3.000 17.000 0"),
            Err(TemplateError::InvalidInput(_))
        ));
        assert!(matches!(
            deserialize("4 x 17.000 0 1"),
            Err(TemplateError::InvalidInput(_))
        ));
        assert!(matches!(
            deserialize("4 3 17 0 7"),
            Err(TemplateError::InvalidInput(_))
        ));
    }

    #[test]
    fn scores() {
        let reference = pairs();
        assert_eq!(match_pairs(&reference, &reference).unwrap(), 1.0);

        let mut query = PairSet::new();
        query.insert(QuantizedPair::new(4, 3, 17, Ending, Bifurcation));
        query.insert(QuantizedPair::new(9, 9, 9, Ending, Ending));
        assert_eq!(match_pairs(&reference, &query).unwrap(), 0.5);
        assert_eq!(match_pairs(&PairSet::new(), &query).unwrap(), 0.0);
    }

    #[test]
    fn empty_query_has_no_score() {
        assert!(matches!(
            match_pairs(&pairs(), &PairSet::new()),
            Err(TemplateError::DivisionByZero)
        ));
    }
}
