//! Position maps produced by steps and composed into mappings.

const DEL_BEFORE: u8 = 1;
const DEL_AFTER: u8 = 2;
const DEL_ACROSS: u8 = 4;
const DEL_SIDE: u8 = 8;

/// A mapped position plus information about what was deleted around it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    del_info: u8,
}

impl MapResult {
    /// The content on the side the position associates with was deleted.
    pub fn deleted(&self) -> bool {
        self.del_info & DEL_SIDE > 0
    }

    pub fn deleted_before(&self) -> bool {
        self.del_info & (DEL_BEFORE | DEL_ACROSS) > 0
    }

    pub fn deleted_after(&self) -> bool {
        self.del_info & (DEL_AFTER | DEL_ACROSS) > 0
    }

    /// The position was strictly inside a deleted range.
    pub fn deleted_across(&self) -> bool {
        self.del_info & DEL_ACROSS > 0
    }
}

/// Anything positions can be mapped through.
pub trait Mappable {
    /// Maps `pos`. `assoc` decides the side a position at an insertion point
    /// sticks to: negative stays before inserted content, positive moves after.
    fn map_result(&self, pos: usize, assoc: i8) -> MapResult;

    fn map(&self, pos: usize, assoc: i8) -> usize {
        self.map_result(pos, assoc).pos
    }
}

/// One replaced range: `old_size` tokens at `start` became `new_size` tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapRange {
    pub start: usize,
    pub old_size: usize,
    pub new_size: usize,
}

/// Position map of a single step: sorted, non-overlapping replaced ranges in
/// the coordinates of the document before the step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepMap {
    ranges: Vec<MapRange>,
}

impl StepMap {
    pub fn new(ranges: Vec<MapRange>) -> Self {
        let ranges = ranges
            .into_iter()
            .filter(|range| range.old_size > 0 || range.new_size > 0)
            .collect();
        StepMap { ranges }
    }

    /// Map of a step that does not move positions.
    pub fn identity() -> Self {
        StepMap::default()
    }

    pub fn replaced(start: usize, old_size: usize, new_size: usize) -> Self {
        StepMap::new(vec![MapRange {
            start,
            old_size,
            new_size,
        }])
    }

    pub fn ranges(&self) -> &[MapRange] {
        &self.ranges
    }

    pub fn is_identity(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Map from the document after the step back to the one before it.
    pub fn invert(&self) -> StepMap {
        let mut diff: isize = 0;
        let mut ranges = Vec::with_capacity(self.ranges.len());
        for range in &self.ranges {
            ranges.push(MapRange {
                start: offset(range.start, diff),
                old_size: range.new_size,
                new_size: range.old_size,
            });
            diff += range.new_size as isize - range.old_size as isize;
        }
        StepMap { ranges }
    }

    /// Calls `f(old_start, old_end, new_start, new_end)` for every range.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(usize, usize, usize, usize),
    {
        let mut diff: isize = 0;
        for range in &self.ranges {
            let new_start = offset(range.start, diff);
            f(
                range.start,
                range.start + range.old_size,
                new_start,
                new_start + range.new_size,
            );
            diff += range.new_size as isize - range.old_size as isize;
        }
    }
}

impl Mappable for StepMap {
    fn map_result(&self, pos: usize, assoc: i8) -> MapResult {
        let mut diff: isize = 0;
        for range in &self.ranges {
            let start = range.start;
            if start > pos {
                break;
            }
            let end = start + range.old_size;
            if pos <= end {
                let side = if range.old_size == 0 {
                    assoc
                } else if pos == start {
                    -1
                } else if pos == end {
                    1
                } else {
                    assoc
                };
                let mapped = offset(start, diff) + if side < 0 { 0 } else { range.new_size };
                let mut del_info = if range.old_size == 0 {
                    0
                } else if pos == start {
                    DEL_AFTER
                } else if pos == end {
                    DEL_BEFORE
                } else {
                    DEL_ACROSS
                };
                let on_side = if assoc < 0 { pos != start } else { pos != end };
                if range.old_size > 0 && on_side {
                    del_info |= DEL_SIDE;
                }
                return MapResult {
                    pos: mapped,
                    del_info,
                };
            }
            diff += range.new_size as isize - range.old_size as isize;
        }
        MapResult {
            pos: offset(pos, diff),
            del_info: 0,
        }
    }
}

/// Composition of step maps, applied left to right.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Mapping::default()
    }

    pub fn from_maps(maps: Vec<StepMap>) -> Self {
        Mapping { maps }
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn append_map(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn append_mapping(&mut self, other: &Mapping) {
        self.maps.extend(other.maps.iter().cloned());
    }

    /// Mapping made of the maps from index `from` on.
    pub fn slice(&self, from: usize) -> Mapping {
        Mapping {
            maps: self.maps.get(from..).map(<[StepMap]>::to_vec).unwrap_or_default(),
        }
    }

    pub fn invert(&self) -> Mapping {
        Mapping {
            maps: self.maps.iter().rev().map(StepMap::invert).collect(),
        }
    }
}

impl Mappable for Mapping {
    fn map_result(&self, pos: usize, assoc: i8) -> MapResult {
        let mut del_info = 0;
        let mut pos = pos;
        for map in &self.maps {
            let result = map.map_result(pos, assoc);
            del_info |= result.del_info;
            pos = result.pos;
        }
        MapResult { pos, del_info }
    }
}

fn offset(pos: usize, diff: isize) -> usize {
    (pos as isize + diff).max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_shifts_following_positions() {
        let map = StepMap::replaced(5, 0, 3);
        assert_eq!(map.map(4, 1), 4);
        assert_eq!(map.map(5, 1), 8);
        assert_eq!(map.map(5, -1), 5);
        assert_eq!(map.map(9, 1), 12);
        assert!(!map.map_result(5, 1).deleted());
    }

    #[test]
    fn deletion_collapses_interior_positions() {
        let map = StepMap::replaced(2, 4, 0);
        let inside = map.map_result(4, 1);
        assert_eq!(inside.pos, 2);
        assert!(inside.deleted());
        assert!(inside.deleted_across());

        let at_start = map.map_result(2, 1);
        assert_eq!(at_start.pos, 2);
        assert!(at_start.deleted());
        assert!(!map.map_result(2, -1).deleted());
        assert!(!map.map_result(6, 1).deleted());
        assert_eq!(map.map(10, 1), 6);
    }

    #[test]
    fn inverted_maps_restore_positions_outside_changes() {
        let map = StepMap::replaced(3, 2, 5);
        let inverse = map.invert();
        for pos in [0, 1, 2, 3, 5, 8, 12] {
            let mapped = map.map(pos, 1);
            if !(3..=5).contains(&pos) {
                assert_eq!(inverse.map(mapped, 1), pos, "position {pos}");
            }
        }
    }

    #[test]
    fn mapping_accumulates_deletion_flags() {
        let mut mapping = Mapping::new();
        mapping.append_map(StepMap::replaced(2, 2, 0));
        mapping.append_map(StepMap::replaced(0, 0, 1));
        let result = mapping.map_result(3, 1);
        assert_eq!(result.pos, 3);
        assert!(result.deleted());
        assert_eq!(mapping.slice(1).len(), 1);
    }
}
