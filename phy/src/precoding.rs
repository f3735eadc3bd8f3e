//! PDSCH precoding and resource element mapping
//! Based on 3GPP TS 38.211 Sections 7.3.1.4 - 7.3.1.5
//!
//! Layer data symbols and the DMRS of each layer's port are combined into
//! antenna signals with a Q15 weight matrix (32768 = unit weight).

use crate::constellation::scale_by_amplitude;
use crate::dmrs::{dmrs_resource_elements, DmrsPort};
use crate::resource_grid::{FrequencyGrid, PdschAllocation};
use crate::{check_len, PhyError};
use common::{saturate_i16, shift_round, FrameParams, C16};
use ndarray::Array2;
use num_complex::Complex;
use tracing::debug;

/// Unit weight in Q15
pub const PRECODER_UNIT: i32 = 1 << 15;

/// Antenna x layer weight matrix
#[derive(Debug, Clone, PartialEq)]
pub struct PrecodingMatrix {
    weights: Array2<Complex<i32>>,
}

impl PrecodingMatrix {
    /// Layer `v` on antenna `v`; antennas beyond the layer count stay silent
    pub fn identity(nb_antennas: usize, nb_layers: usize) -> Result<Self, PhyError> {
        if nb_layers == 0 || nb_layers > nb_antennas {
            return Err(PhyError::UnsupportedLayerCount(nb_layers));
        }
        let weights = Array2::from_shape_fn((nb_antennas, nb_layers), |(a, v)| {
            Complex::new(if a == v { PRECODER_UNIT } else { 0 }, 0)
        });
        Ok(Self { weights })
    }

    /// Caller-supplied Q15 weights, `rows[antenna][layer]`
    pub fn from_rows(rows: &[Vec<Complex<i32>>]) -> Result<Self, PhyError> {
        let nb_antennas = rows.len();
        let nb_layers = rows.first().map_or(0, |r| r.len());
        if nb_layers == 0 {
            return Err(PhyError::UnsupportedLayerCount(0));
        }
        for row in rows {
            check_len("precoding matrix row", nb_layers, row.len())?;
        }
        let weights = Array2::from_shape_fn((nb_antennas, nb_layers), |(a, v)| rows[a][v]);
        Ok(Self { weights })
    }

    pub fn nb_antennas(&self) -> usize {
        self.weights.dim().0
    }

    pub fn nb_layers(&self) -> usize {
        self.weights.dim().1
    }

    /// Weighted sum of one resource element's layer values for `antenna`
    #[inline]
    pub fn apply(&self, antenna: usize, layer_values: &[C16]) -> C16 {
        let (mut re, mut im) = (0i64, 0i64);
        for (w, x) in self.weights.row(antenna).iter().zip(layer_values) {
            re += w.re as i64 * x.re as i64 - w.im as i64 * x.im as i64;
            im += w.re as i64 * x.im as i64 + w.im as i64 * x.re as i64;
        }
        C16::new(saturate_i16(shift_round(re, 15)), saturate_i16(shift_round(im, 15)))
    }
}

/// Precoder bound to one carrier
#[derive(Debug, Clone)]
pub struct Precoder {
    fp: FrameParams,
    matrix: PrecodingMatrix,
}

impl Precoder {
    pub fn new(fp: FrameParams, matrix: PrecodingMatrix) -> Result<Self, PhyError> {
        check_len("precoder antennas", fp.nb_antennas_tx, matrix.nb_antennas())?;
        Ok(Self { fp, matrix })
    }

    pub fn matrix(&self) -> &PrecodingMatrix {
        &self.matrix
    }

    /// Map layer symbols and DMRS onto the transmit grid
    ///
    /// `layers[v]` holds the data symbols of layer `v` in resource element
    /// order (symbol, then subcarrier). DMRS are scaled by `dmrs_amplitude`.
    pub fn precode(
        &self,
        alloc: &PdschAllocation,
        slot: u32,
        layers: &[Vec<C16>],
        dmrs_amplitude: i16,
        grid: &mut FrequencyGrid,
    ) -> Result<(), PhyError> {
        alloc.validate(&self.fp)?;
        let nb_layers = alloc.nb_layers();
        check_len("precoder layers", self.matrix.nb_layers(), nb_layers)?;
        check_len("layer streams", nb_layers, layers.len())?;
        let per_layer = alloc.nb_data_res();
        for layer in layers {
            check_len("layer symbols", per_layer, layer.len())?;
        }
        check_len("transmit grid antennas", self.matrix.nb_antennas(), grid.nb_antennas())?;

        let ports: Vec<DmrsPort> = alloc
            .dmrs_ports
            .iter()
            .map(|&p| DmrsPort::new(p))
            .collect::<Result<_, _>>()?;
        let first = alloc.first_subcarrier();
        let nb_sc = alloc.nb_subcarriers();
        let zero = C16::new(0, 0);
        let mut cursor = 0usize;
        // one allocated symbol, indexed [subcarrier][layer]
        let mut layer_res = vec![vec![zero; nb_layers]; nb_sc];

        for l in alloc.start_symbol..alloc.start_symbol + alloc.nb_symbols {
            layer_res.iter_mut().for_each(|re| re.fill(zero));
            let mut used = vec![false; nb_sc];

            if alloc.is_dmrs_symbol(l) {
                for (v, port) in ports.iter().enumerate() {
                    for (k, pilot) in dmrs_resource_elements(alloc, port, slot, l, self.fp.symbols_per_slot()) {
                        layer_res[k - first][v] = scale_by_amplitude(pilot, dmrs_amplitude);
                        used[k - first] = true;
                    }
                }
            }
            let data = alloc.data_subcarriers(l);
            for &k in &data {
                for (v, layer) in layers.iter().enumerate() {
                    layer_res[k - first][v] = layer[cursor];
                }
                used[k - first] = true;
                cursor += 1;
            }

            for (i, values) in layer_res.iter().enumerate() {
                if !used[i] {
                    continue;
                }
                for antenna in 0..self.matrix.nb_antennas() {
                    grid.set_re(&self.fp, antenna, l, first + i, self.matrix.apply(antenna, values));
                }
            }
        }

        debug!(
            "Precoded {} layers onto {} antennas: {} data REs per layer, slot {}",
            nb_layers,
            self.matrix.nb_antennas(),
            per_layer,
            slot
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_transparent() {
        let m = PrecodingMatrix::identity(2, 2).unwrap();
        let values = [C16::new(1234, -4321), C16::new(-7, 7)];
        assert_eq!(m.apply(0, &values), values[0]);
        assert_eq!(m.apply(1, &values), values[1]);
        assert!(PrecodingMatrix::identity(1, 2).is_err());
    }

    #[test]
    fn test_custom_weights() {
        // antenna 0 = (x0 + x1) / 2, antenna 1 = j * x0
        let half = Complex::new(PRECODER_UNIT / 2, 0);
        let rows = vec![vec![half, half], vec![Complex::new(0, PRECODER_UNIT), Complex::new(0, 0)]];
        let m = PrecodingMatrix::from_rows(&rows).unwrap();
        let values = [C16::new(100, 0), C16::new(0, 100)];
        assert_eq!(m.apply(0, &values), C16::new(50, 50));
        assert_eq!(m.apply(1, &values), C16::new(0, 100));
        assert!(PrecodingMatrix::from_rows(&[vec![half], vec![half, half]]).is_err());
    }

    #[test]
    fn test_precode_maps_data_and_dmrs() {
        let fp = FrameParams::default();
        let alloc = PdschAllocation::default();
        let precoder = Precoder::new(fp.clone(), PrecodingMatrix::identity(1, 1).unwrap()).unwrap();
        let data: Vec<C16> = (0..alloc.nb_data_res()).map(|i| C16::new(i as i16, 1)).collect();
        let mut grid = FrequencyGrid::for_tx(&fp).unwrap();
        precoder.precode(&alloc, 0, &[data], 8192, &mut grid).unwrap();

        // symbols 0 and 1 carry data on every subcarrier
        assert_eq!(grid.re(&fp, 0, 0, 0), C16::new(0, 1));
        assert_eq!(grid.re(&fp, 0, 1, 0), C16::new(300, 1));
        // DMRS symbol: pilots on even subcarriers, data on odd ones
        let pilot = grid.re(&fp, 0, 2, 0);
        assert!((2896..=2897).contains(&pilot.re.abs()));
        assert_eq!(grid.re(&fp, 0, 2, 1), C16::new(600, 1));
        assert_eq!(grid.re(&fp, 0, 3, 0), C16::new(750, 1));
    }

    #[test]
    fn test_precode_rejects_wrong_lengths() {
        let fp = FrameParams::default();
        let alloc = PdschAllocation::default();
        let precoder = Precoder::new(fp.clone(), PrecodingMatrix::identity(1, 1).unwrap()).unwrap();
        let mut grid = FrequencyGrid::for_tx(&fp).unwrap();
        assert!(precoder.precode(&alloc, 0, &[vec![C16::new(0, 0); 10]], 8192, &mut grid).is_err());
        assert!(Precoder::new(fp, PrecodingMatrix::identity(2, 1).unwrap()).is_err());
    }
}
