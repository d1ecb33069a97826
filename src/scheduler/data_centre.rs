use rand::seq::SliceRandom;

use crate::error::SchedulerError;

/// Splits a pod name of the form `<base>-<ordinal>` and returns the
/// ordinal. Stateful set member names always end in a numeric ordinal;
/// anything else is an ordinal-unparseable decision error.
fn pod_ordinal(pod_name: &str) -> Result<i64, SchedulerError> {
    pod_name
        .rsplit('-')
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| SchedulerError::OrdinalUnparseable(pod_name.to_owned()))
}

/// Chooses the data centre a pod should be placed in.
///
/// Members below the last ordinal are primaries, deterministically
/// round-robined across `primary_data_centres` by ordinal modulo list
/// length. The last member (`ordinal == replicas - 1`) is the arbiter and
/// is placed in a uniformly-random non-primary data centre.
pub fn choose_data_centre(
    pod_name: &str,
    replicas: i32,
    primary_data_centres: &[String],
    no_primary_data_centres: &[String],
) -> Result<String, SchedulerError> {
    let ordinal = pod_ordinal(pod_name)?;

    if ordinal != (replicas as i64) - 1 {
        if primary_data_centres.is_empty() {
            return Err(SchedulerError::UnschedulableNodes {
                pod: pod_name.to_owned(),
                reason: "no primary data centres configured".into(),
            });
        }

        let index = (ordinal % primary_data_centres.len() as i64) as usize;
        log::debug!("primary pod, ordinal {ordinal}, data centre index {index}");
        Ok(primary_data_centres[index].clone())
    } else {
        if no_primary_data_centres.is_empty() {
            return Err(SchedulerError::UnschedulableNodes {
                pod: pod_name.to_owned(),
                reason: "no non-primary data centres configured".into(),
            });
        }

        log::debug!("arbiter pod, ordinal {ordinal}");
        let mut rng = rand::thread_rng();
        Ok(no_primary_data_centres
            .choose(&mut rng)
            .expect("checked non-empty above")
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dcs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn primary_member_zero_rolls_to_first_dc() {
        let dc = choose_data_centre("mongo-0", 3, &dcs(&["dc1", "dc2"]), &dcs(&["dc3"])).unwrap();
        assert_eq!(dc, "dc1");
    }

    #[test]
    fn primary_member_one_rolls_to_second_dc() {
        let dc = choose_data_centre("mongo-1", 3, &dcs(&["dc1", "dc2"]), &dcs(&["dc3"])).unwrap();
        assert_eq!(dc, "dc2");
    }

    #[test]
    fn primary_rollover_wraps_with_modulo() {
        // ordinal 2 with replicas 5 (not the last) and two primary DCs wraps to dc1.
        let dc = choose_data_centre("mongo-2", 5, &dcs(&["dc1", "dc2"]), &dcs(&["dc3"])).unwrap();
        assert_eq!(dc, "dc1");
    }

    #[test]
    fn arbiter_member_chooses_from_non_primary_list() {
        let non_primary = dcs(&["dc3"]);
        let dc = choose_data_centre("mongo-2", 3, &dcs(&["dc1", "dc2"]), &non_primary).unwrap();
        assert!(non_primary.contains(&dc));
    }

    #[test]
    fn unparseable_ordinal_is_an_error() {
        let err = choose_data_centre("mongo-last", 3, &dcs(&["dc1"]), &dcs(&["dc3"])).unwrap_err();
        assert!(matches!(err, SchedulerError::OrdinalUnparseable(_)));
    }

    #[test]
    fn empty_primary_list_is_unschedulable() {
        let err = choose_data_centre("mongo-0", 3, &[], &dcs(&["dc3"])).unwrap_err();
        assert!(matches!(err, SchedulerError::UnschedulableNodes { .. }));
    }
}
