//! DMRS (Demodulation Reference Signal) generation for PDSCH
//! Based on 3GPP TS 38.211 Section 7.4.1.1

use crate::constellation::QPSK_UNIT;
use crate::resource_grid::PdschAllocation;
use crate::scrambling::GoldSequence;
use crate::PhyError;
use common::C16;

/// DMRS resource elements per resource block for configuration type 1
pub const DMRS_TYPE1_PER_RB: usize = 6;

/// Type-1 DMRS antenna port parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmrsPort {
    /// Antenna port index (1000 + p)
    pub port: u8,
    /// CDM group, also the subcarrier offset Delta
    pub cdm_group: usize,
    /// Frequency OCC w_f(1) is -1
    pub negate_odd: bool,
}

impl DmrsPort {
    /// Look up ports 0..=3 of Table 7.4.1.1.2-1
    pub fn new(port: u8) -> Result<Self, PhyError> {
        let (cdm_group, negate_odd) = match port {
            0 => (0, false),
            1 => (0, true),
            2 => (1, false),
            3 => (1, true),
            _ => {
                return Err(PhyError::InvalidConfiguration(format!(
                    "DMRS port {} not supported for type 1",
                    port
                )))
            }
        };
        Ok(Self {
            port,
            cdm_group,
            negate_odd,
        })
    }

    /// Frequency OCC weight w_f(k')
    #[inline]
    pub fn w_f(&self, k_prime: usize) -> i32 {
        if self.negate_odd && k_prime % 2 == 1 {
            -1
        } else {
            1
        }
    }
}

/// PDSCH DMRS initialisation
/// c_init = (2^17 * (N_symb * n_slot + l + 1) * (2 * N_ID + 1) + 2 * N_ID + n_SCID) mod 2^31
pub fn calculate_pdsch_dmrs_cinit(
    slot: u32,
    symbol: usize,
    n_id: u16,
    n_scid: u8,
    symbols_per_slot: usize,
) -> u32 {
    let l = symbol as u64;
    let n_id = n_id as u64;
    let value = (1u64 << 17) * (symbols_per_slot as u64 * slot as u64 + l + 1) * (2 * n_id + 1)
        + 2 * n_id
        + n_scid as u64;
    (value & 0x7FFF_FFFF) as u32
}

/// QPSK reference sequence r(m) for m in `first..first + count`, in Q14
pub fn generate_dmrs_sequence(c_init: u32, first: usize, count: usize) -> Vec<C16> {
    let mut gold = GoldSequence::new(c_init);
    gold.skip(2 * first);
    (0..count)
        .map(|_| {
            let c0 = gold.next_bit() as i32;
            let c1 = gold.next_bit() as i32;
            C16::new(
                ((1 - 2 * c0) * QPSK_UNIT) as i16,
                ((1 - 2 * c1) * QPSK_UNIT) as i16,
            )
        })
        .collect()
}

/// Pilot resource elements of one port in one DMRS symbol
///
/// Returns `(subcarrier, value)` pairs over the allocated resource blocks in
/// ascending subcarrier order. The sequence is referenced to subcarrier 0 of
/// the carrier and already carries the frequency OCC.
pub fn dmrs_resource_elements(
    alloc: &PdschAllocation,
    port: &DmrsPort,
    slot: u32,
    symbol: usize,
    symbols_per_slot: usize,
) -> Vec<(usize, C16)> {
    let c_init = calculate_pdsch_dmrs_cinit(slot, symbol, alloc.dmrs_scrambling_id, alloc.n_scid, symbols_per_slot);
    let first_m = alloc.start_rb as usize * DMRS_TYPE1_PER_RB;
    let count = alloc.nb_rb as usize * DMRS_TYPE1_PER_RB;
    let sequence = generate_dmrs_sequence(c_init, first_m, count);

    sequence
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            let m = first_m + i;
            let k = 2 * m + port.cdm_group;
            let w = port.w_f(m % 2);
            (k, C16::new(r.re * w as i16, r.im * w as i16))
        })
        .collect()
}
