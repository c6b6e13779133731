use evalforge_core::operation;
use evalforge_core::Aggr;

/// Running aggregate over cells fed in row-major order.
///
/// The first value seeds the accumulator, so both engines produce
/// bit-identical results as long as they feed cells in the same order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Aggregator {
    aggr: Aggr,
    acc: f64,
    count: usize,
}

impl Aggregator {
    pub fn new(aggr: Aggr) -> Self {
        Self {
            aggr,
            acc: 0.0,
            count: 0,
        }
    }

    pub fn add(&mut self, value: f64) {
        self.acc = if self.count == 0 {
            value
        } else {
            match self.aggr {
                Aggr::Avg | Aggr::Sum => self.acc + value,
                Aggr::Prod => self.acc * value,
                Aggr::Max => operation::max(self.acc, value),
                Aggr::Min => operation::min(self.acc, value),
                Aggr::Count => 0.0,
            }
        };
        self.count += 1;
    }

    pub fn result(&self) -> f64 {
        match self.aggr {
            Aggr::Count => self.count as f64,
            Aggr::Avg => self.acc / self.count as f64,
            Aggr::Sum | Aggr::Prod | Aggr::Max | Aggr::Min => self.acc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(aggr: Aggr, values: &[f64]) -> f64 {
        let mut a = Aggregator::new(aggr);
        for &v in values {
            a.add(v);
        }
        a.result()
    }

    #[test]
    fn test_aggregators() {
        let values = [3.0, -1.0, 4.0, 2.0];
        assert_eq!(aggregate(Aggr::Avg, &values), 2.0);
        assert_eq!(aggregate(Aggr::Count, &values), 4.0);
        assert_eq!(aggregate(Aggr::Prod, &values), -24.0);
        assert_eq!(aggregate(Aggr::Sum, &values), 8.0);
        assert_eq!(aggregate(Aggr::Max, &values), 4.0);
        assert_eq!(aggregate(Aggr::Min, &values), -1.0);
    }

    #[test]
    fn test_single_value_is_its_own_aggregate() {
        for aggr in Aggr::ALL {
            let expected: f64 = if aggr == Aggr::Count { 1.0 } else { -0.0 };
            let got = aggregate(aggr, &[-0.0]);
            assert_eq!(got.to_bits(), expected.to_bits(), "{}", aggr.name());
        }
    }
}
