//! Pixel adjacency rules for region grouping

/// Which pixels count as touching a given pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Shared edge only
    #[default]
    Four,
    /// Shared edge or corner
    Eight,
}

const EDGE: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
const EDGE_AND_CORNER: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

impl Connectivity {
    /// (row, col) offsets of the adjacent pixels
    pub fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &EDGE,
            Connectivity::Eight => &EDGE_AND_CORNER,
        }
    }

    /// Adjacent pixels of (row, col) that lie inside a `rows` x `cols` grid
    pub fn neighbors(
        self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> impl Iterator<Item = (usize, usize)> {
        self.offsets().iter().filter_map(move |&(dr, dc)| {
            let r = row.checked_add_signed(dr)?;
            let c = col.checked_add_signed(dc)?;
            (r < rows && c < cols).then_some((r, c))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbors_clip_at_edges() {
        let corner: Vec<_> = Connectivity::Four.neighbors(0, 0, 3, 3).collect();
        assert_eq!(corner, vec![(0, 1), (1, 0)]);
        assert_eq!(Connectivity::Eight.neighbors(1, 1, 3, 3).count(), 8);
        assert_eq!(Connectivity::Eight.neighbors(2, 2, 3, 3).count(), 3);
    }
}
