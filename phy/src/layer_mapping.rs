//! Layer mapping and demapping
//! Based on 3GPP TS 38.211 Section 7.3.1.3
//!
//! One codeword over up to four layers: symbol `i` of layer `v` is codeword
//! symbol `i * Nl + v`. The receive side interleaves `Qm` LLRs per layer in
//! layer order.

use crate::PhyError;
use common::MAX_ANTENNAS;
use tracing::debug;

/// Flag value marking an unused codeword slot
pub const INACTIVE_CODEWORD: i32 = -1;

fn check_layers(nb_layers: usize) -> Result<(), PhyError> {
    if nb_layers == 0 || nb_layers > MAX_ANTENNAS {
        return Err(PhyError::UnsupportedLayerCount(nb_layers));
    }
    Ok(())
}

/// Which of the two codeword slots carry data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveCodewords {
    active: [bool; 2],
}

impl ActiveCodewords {
    /// Only codeword `index` carries data
    pub fn single(index: usize) -> Result<Self, PhyError> {
        match index {
            0 => Ok(Self { active: [true, false] }),
            1 => Ok(Self { active: [false, true] }),
            _ => Err(PhyError::InvalidCodewords(format!("codeword index {}", index))),
        }
    }

    /// Interpret per-codeword companion flags, `-1` marking an inactive slot
    pub fn from_flags(flags: [i32; 2]) -> Self {
        Self {
            active: flags.map(|f| f != INACTIVE_CODEWORD),
        }
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.active.get(index).copied().unwrap_or(false)
    }

    /// The one active codeword of a transmission with at most four layers
    pub fn single_active(&self) -> Result<usize, PhyError> {
        match self.active {
            [true, false] => Ok(0),
            [false, true] => Ok(1),
            [false, false] => Err(PhyError::InvalidCodewords("no active codeword".into())),
            [true, true] => Err(PhyError::InvalidCodewords(
                "two codewords need more than four layers".into(),
            )),
        }
    }
}

/// Split codeword symbols across `nb_layers` layers
pub fn map_layers<T: Copy>(symbols: &[T], nb_layers: usize) -> Result<Vec<Vec<T>>, PhyError> {
    check_layers(nb_layers)?;
    if symbols.len() % nb_layers != 0 {
        return Err(PhyError::InvalidConfiguration(format!(
            "{} symbols do not split evenly over {} layers",
            symbols.len(),
            nb_layers
        )));
    }
    let per_layer = symbols.len() / nb_layers;
    let layers = (0..nb_layers)
        .map(|v| (0..per_layer).map(|i| symbols[i * nb_layers + v]).collect())
        .collect();
    debug!("Mapped {} symbols onto {} layers", symbols.len(), nb_layers);
    Ok(layers)
}

/// Reassemble codeword LLRs from per-layer LLR streams
///
/// `total_length` LLRs are produced for the active codeword; the inactive
/// slot is `None`.
pub fn demap_layers(
    layer_llrs: &[Vec<i16>],
    nb_layers: usize,
    qm: usize,
    total_length: usize,
    active: ActiveCodewords,
) -> Result<[Option<Vec<i16>>; 2], PhyError> {
    check_layers(nb_layers)?;
    let codeword = active.single_active()?;
    if layer_llrs.len() != nb_layers {
        return Err(PhyError::LengthMismatch {
            what: "layer LLR streams",
            expected: nb_layers,
            actual: layer_llrs.len(),
        });
    }
    if qm == 0 || total_length % (nb_layers * qm) != 0 {
        return Err(PhyError::InvalidConfiguration(format!(
            "codeword length {} is not a multiple of {} layers x Qm {}",
            total_length, nb_layers, qm
        )));
    }
    let per_layer = total_length / nb_layers;
    if let Some(short) = layer_llrs.iter().find(|l| l.len() < per_layer) {
        return Err(PhyError::LengthMismatch {
            what: "layer LLR stream",
            expected: per_layer,
            actual: short.len(),
        });
    }

    let out = if nb_layers == 1 {
        layer_llrs[0][..total_length].to_vec()
    } else {
        let mut out = Vec::with_capacity(total_length);
        for i in 0..per_layer / qm {
            for layer in layer_llrs {
                out.extend_from_slice(&layer[i * qm..(i + 1) * qm]);
            }
        }
        out
    };

    debug!(
        "Demapped {} LLRs from {} layers (Qm={}) into codeword {}",
        total_length, nb_layers, qm, codeword
    );
    let mut result = [None, None];
    result[codeword] = Some(out);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_two_layers() {
        let layers = map_layers(&[0, 1, 2, 3, 4, 5], 2).unwrap();
        assert_eq!(layers, vec![vec![0, 2, 4], vec![1, 3, 5]]);
        assert!(map_layers(&[0, 1, 2], 2).is_err());
        assert_eq!(map_layers(&[0u8; 10], 5), Err(PhyError::UnsupportedLayerCount(5)));
    }

    #[test]
    fn test_round_trip_all_layer_counts() {
        let qm = 4;
        for nb_layers in 1..=4 {
            let nb_symbols = 12 * nb_layers;
            let symbols: Vec<usize> = (0..nb_symbols).collect();
            let layers = map_layers(&symbols, nb_layers).unwrap();

            // expand every symbol into Qm LLRs carrying its index
            let layer_llrs: Vec<Vec<i16>> = layers
                .iter()
                .map(|l| l.iter().flat_map(|&s| (0..qm).map(move |b| (s * qm + b) as i16)).collect())
                .collect();
            let total = nb_symbols * qm;
            let [cw0, cw1] = demap_layers(&layer_llrs, nb_layers, qm, total, ActiveCodewords::single(0).unwrap()).unwrap();
            assert!(cw1.is_none());
            let expected: Vec<i16> = (0..total as i16).collect();
            assert_eq!(cw0.unwrap(), expected, "layers={}", nb_layers);
        }
    }

    #[test]
    fn test_single_layer_goes_to_active_codeword() {
        let flags = ActiveCodewords::from_flags([INACTIVE_CODEWORD, 3]);
        let [cw0, cw1] = demap_layers(&[vec![1, -2, 3, -4]], 1, 2, 4, flags).unwrap();
        assert!(cw0.is_none());
        assert_eq!(cw1.unwrap(), vec![1, -2, 3, -4]);
    }

    #[test]
    fn test_codeword_activity_errors() {
        let none = ActiveCodewords::from_flags([INACTIVE_CODEWORD, INACTIVE_CODEWORD]);
        assert!(matches!(
            demap_layers(&[vec![0; 4]], 1, 2, 4, none),
            Err(PhyError::InvalidCodewords(_))
        ));
        let both = ActiveCodewords::from_flags([0, 1]);
        assert!(both.is_active(0) && both.is_active(1));
        assert!(matches!(both.single_active(), Err(PhyError::InvalidCodewords(_))));
        assert!(ActiveCodewords::single(2).is_err());
    }

    #[test]
    fn test_demap_rejects_bad_shapes() {
        let active = ActiveCodewords::single(0).unwrap();
        assert_eq!(
            demap_layers(&vec![vec![0; 8]; 5], 5, 2, 40, active),
            Err(PhyError::UnsupportedLayerCount(5))
        );
        assert!(demap_layers(&[vec![0; 8]], 2, 2, 16, active).is_err());
        assert!(demap_layers(&[vec![0; 8], vec![0; 8]], 2, 2, 18, active).is_err());
        assert!(demap_layers(&[vec![0; 8], vec![0; 6]], 2, 2, 16, active).is_err());
    }
}
