// ballistics.rs

/// Per-band asymmetric exponential smoothing: rises close `attack` of the gap
/// per tick, falls close `decay` of it. Mimics a VU meter, quick up, slow down.
#[derive(Debug, Clone, PartialEq)]
pub struct Ballistics {
    attack: f32,
    decay: f32,
    floor: f32,
    levels: Vec<f32>,
}

impl Ballistics {
    pub fn new(bands: usize, attack: f32, decay: f32, floor: f32) -> Self {
        Self {
            attack: attack.clamp(0.0, 1.0),
            decay: decay.clamp(0.0, 1.0),
            floor,
            levels: vec![floor; bands],
        }
    }

    /// Move every displayed level toward its target and return the result.
    /// `targets` shorter than the band count leave the remaining bands alone.
    pub fn update(&mut self, targets: &[f32]) -> &[f32] {
        for (shown, &target) in self.levels.iter_mut().zip(targets) {
            let rate = if target > *shown { self.attack } else { self.decay };
            *shown += (target - *shown) * rate;
            if !shown.is_finite() || *shown < self.floor {
                *shown = self.floor;
            }
        }
        &self.levels
    }

    /// Drop every band straight to the floor.
    pub fn reset(&mut self) {
        self.levels.fill(self.floor);
    }

    pub fn levels(&self) -> &[f32] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn attack(&self) -> f32 {
        self.attack
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }
}
