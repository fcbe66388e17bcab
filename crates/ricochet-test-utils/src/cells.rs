//! Uniform 1-D cell list over a [`RodGas`].
//!
//! Cells are at least one rod length wide, so any pair that can touch
//! shares a cell or sits in adjacent cells. A rod's exit through a cell
//! face is a partition transition with the direction in `aux`.

use ricochet_core::{
    BodyId, Candidates, DynamicsProvider, EventRecord, NeighbourProvider, Prediction,
    ProviderError, Resolution, SimTime,
};

use crate::rods::RodGas;

/// `aux` of a transition into the cell on the left.
pub const MOVE_LEFT: u32 = 0;
/// `aux` of a transition into the cell on the right.
pub const MOVE_RIGHT: u32 = 1;

/// Cell membership for every rod.
#[derive(Clone, Debug, PartialEq)]
pub struct CellList1D {
    width: f64,
    cell_of: Vec<u32>,
    members: Vec<Vec<BodyId>>,
}

impl CellList1D {
    /// Cells of width at least `min_width` tiling `gas`'s box. Call
    /// [`rebuild`](NeighbourProvider::rebuild) (or let the kernel do it)
    /// before querying.
    pub fn new(gas: &RodGas, min_width: f64) -> Self {
        let width = min_width.max(gas.sigma());
        let count = ((gas.length() / width).floor() as usize).max(1);
        Self {
            width: gas.length() / count as f64,
            cell_of: Vec::new(),
            members: vec![Vec::new(); count],
        }
    }

    /// Number of cells.
    pub fn cell_count(&self) -> usize {
        self.members.len()
    }

    /// Cell currently holding `body`.
    pub fn cell_of(&self, body: BodyId) -> Option<u32> {
        self.cell_of.get(body.index()).copied()
    }

    /// Rods in cell `c`, in ascending order.
    pub fn members(&self, c: usize) -> &[BodyId] {
        self.members.get(c).map_or(&[][..], Vec::as_slice)
    }

    /// Cell of position `x`. A rod exactly on a face belongs to the side
    /// it is moving towards.
    fn locate(&self, x: f64, v: f64) -> u32 {
        let last = self.members.len() - 1;
        let scaled = x / self.width;
        let mut c = scaled.floor();
        if scaled == c && v < 0.0 {
            c -= 1.0;
        }
        c.clamp(0.0, last as f64) as u32
    }

    fn insert(&mut self, body: BodyId, c: u32) {
        let cell = &mut self.members[c as usize];
        if let Err(pos) = cell.binary_search(&body) {
            cell.insert(pos, body);
        }
    }

    fn remove(&mut self, body: BodyId, c: u32) {
        let cell = &mut self.members[c as usize];
        if let Ok(pos) = cell.binary_search(&body) {
            cell.remove(pos);
        }
    }

    fn assign(&mut self, cell_of: Vec<u32>) {
        for cell in &mut self.members {
            cell.clear();
        }
        for (i, &c) in cell_of.iter().enumerate() {
            self.members[c as usize].push(BodyId(i as u32));
        }
        self.cell_of = cell_of;
    }
}

impl NeighbourProvider<RodGas> for CellList1D {
    fn query(&self, _gas: &RodGas, body: BodyId, out: &mut Candidates) {
        let Some(c) = self.cell_of(body) else {
            return;
        };
        let c = c as usize;
        let lo = c.saturating_sub(1);
        let hi = (c + 1).min(self.members.len() - 1);
        // Cells hold ascending ids; adjacent cells interleave.
        for cell in &self.members[lo..=hi] {
            out.extend(cell.iter().copied().filter(|&b| b != body));
        }
        out.sort_unstable();
    }

    fn predict_transition(&self, gas: &RodGas, body: BodyId, now: SimTime) -> Prediction {
        let Some(c) = self.cell_of(body) else {
            return Prediction::NEVER;
        };
        let x = gas.position(body, now.value());
        let v = gas.velocity(body);
        let last = (self.members.len() - 1) as u32;
        if v > 0.0 && c < last {
            let face = (c + 1) as f64 * self.width;
            Prediction::after((face - x) / v).with_aux(MOVE_RIGHT)
        } else if v < 0.0 && c > 0 {
            let face = c as f64 * self.width;
            Prediction::after((x - face) / -v).with_aux(MOVE_LEFT)
        } else {
            Prediction::NEVER
        }
    }

    fn apply_transition(
        &mut self,
        _gas: &RodGas,
        record: &EventRecord,
        _now: SimTime,
    ) -> Result<Resolution, ProviderError> {
        let corrupt = |reason: String| ProviderError::StateCorrupt { reason };
        let body = record
            .subject()
            .body()
            .ok_or_else(|| corrupt(format!("transition {record} has no body")))?;
        let c = self
            .cell_of(body)
            .ok_or_else(|| corrupt(format!("{body} is in no cell")))?;
        let to = match record.aux() {
            MOVE_LEFT if c > 0 => c - 1,
            MOVE_RIGHT if (c as usize) + 1 < self.members.len() => c + 1,
            aux => return Err(corrupt(format!("{body} cannot leave cell {c} with aux {aux}"))),
        };
        self.remove(body, c);
        self.insert(body, to);
        self.cell_of[body.index()] = to;
        Ok(Resolution::affecting(&[body]))
    }

    fn rebuild(&mut self, gas: &RodGas, now: SimTime) {
        let cell_of: Vec<u32> = (0..gas.body_count())
            .map(|i| {
                let b = BodyId(i as u32);
                self.locate(gas.position(b, now.value()), gas.velocity(b))
            })
            .collect();
        self.assign(cell_of);
    }

    fn save_state(&self) -> Vec<u8> {
        self.cell_of.iter().flat_map(|c| c.to_le_bytes()).collect()
    }

    fn load_state(&mut self, gas: &RodGas, blob: &[u8], _now: SimTime) -> Result<(), ProviderError> {
        let n = gas.body_count();
        if blob.len() != 4 * n {
            return Err(ProviderError::StateCorrupt {
                reason: format!("expected {} membership bytes, got {}", 4 * n, blob.len()),
            });
        }
        let mut cell_of = Vec::with_capacity(n);
        for chunk in blob.chunks_exact(4) {
            let mut b = [0u8; 4];
            b.copy_from_slice(chunk);
            let c = u32::from_le_bytes(b);
            if c as usize >= self.members.len() {
                return Err(ProviderError::StateCorrupt {
                    reason: format!("cell {c} out of range"),
                });
            }
            cell_of.push(c);
        }
        self.assign(cell_of);
        Ok(())
    }
}
