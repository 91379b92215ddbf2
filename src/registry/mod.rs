//! Static declarations of the suite's task classes.
//!
//! Each class is a descriptor record: valid hours, behavioural variant, the
//! hour-conditional prerequisite and postrequisite templates, and the
//! external-job command template. Instances are stamped out of these
//! descriptors by the scheduler; there is no per-class behaviour beyond what
//! the variant tag selects.

use crate::errors::SchedulerError;
use crate::models::ref_time::RefTime;
use crate::models::requisites::RequisiteSet;

/// Default runahead bound: how many finished instances of a source class may
/// accumulate before further dispatch is held.
pub const MAX_FINISHED: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Standard,
    /// Dependency-free source tasks that would otherwise run ahead
    /// indefinitely; dispatch is held while `max_finished` finished
    /// instances of the class remain in the pool.
    RunaheadLimited { max_finished: usize },
    /// Consumes a fuzzy upstream artifact and listens for suite-wide
    /// CATCHUP/UPTODATE mode signals.
    FuzzyConsumer,
}

/// Scheduler state read by prerequisite templates at instance construction.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext {
    /// In catchup mode the fuzzy consumer accepts a much younger upstream
    /// artifact (11 h cutoff instead of 23 h).
    pub catchup_mode: bool,
}

impl Default for TemplateContext {
    fn default() -> Self {
        // assume catchup until an UPTODATE signal says otherwise
        Self { catchup_mode: true }
    }
}

#[derive(Debug)]
pub struct TaskClass {
    pub name: &'static str,
    pub valid_hours: &'static [u32],
    pub variant: Variant,
    pub prerequisites: fn(RefTime, &TemplateContext) -> RequisiteSet,
    pub postrequisites: fn(RefTime) -> RequisiteSet,
    /// External-job command template; `{ref_time}` is substituted at launch.
    pub command: &'static str,
}

pub fn lookup(name: &str) -> Result<&'static TaskClass, SchedulerError> {
    CLASSES
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| SchedulerError::UnknownClass(name.to_string()))
}

static ALL_HOURS: [u32; 24] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23,
];

pub static CLASSES: &[TaskClass] = &[
    TaskClass {
        name: "downloader",
        valid_hours: &[0, 6, 12, 18],
        variant: Variant::RunaheadLimited {
            max_finished: MAX_FINISHED,
        },
        prerequisites: no_prerequisites,
        postrequisites: downloader_postrequisites,
        command: "bin/run-downloader {ref_time}",
    },
    TaskClass {
        name: "oper_to_topnet",
        valid_hours: &[6, 18],
        variant: Variant::RunaheadLimited {
            max_finished: MAX_FINISHED,
        },
        prerequisites: no_prerequisites,
        postrequisites: oper_to_topnet_postrequisites,
        command: "bin/run-oper-to-topnet {ref_time}",
    },
    TaskClass {
        name: "nzlam",
        valid_hours: &[0, 6, 12, 18],
        variant: Variant::Standard,
        prerequisites: nzlam_prerequisites,
        postrequisites: nzlam_postrequisites,
        command: "bin/run-nzlam {ref_time}",
    },
    TaskClass {
        name: "nzlam_post",
        valid_hours: &[0, 6, 12, 18],
        variant: Variant::Standard,
        prerequisites: nzlam_post_prerequisites,
        postrequisites: nzlam_post_postrequisites,
        command: "bin/run-nzlam-post {ref_time}",
    },
    TaskClass {
        name: "globalprep",
        valid_hours: &[0],
        variant: Variant::Standard,
        prerequisites: globalprep_prerequisites,
        postrequisites: globalprep_postrequisites,
        command: "bin/run-globalprep {ref_time}",
    },
    TaskClass {
        name: "globalwave",
        valid_hours: &[0],
        variant: Variant::Standard,
        prerequisites: globalwave_prerequisites,
        postrequisites: globalwave_postrequisites,
        command: "bin/run-globalwave {ref_time}",
    },
    TaskClass {
        name: "nzwave",
        valid_hours: &[0, 6, 12, 18],
        variant: Variant::Standard,
        prerequisites: nzwave_prerequisites,
        postrequisites: nzwave_postrequisites,
        command: "bin/run-nzwave {ref_time}",
    },
    TaskClass {
        name: "ricom",
        valid_hours: &[6, 18],
        variant: Variant::Standard,
        prerequisites: ricom_prerequisites,
        postrequisites: ricom_postrequisites,
        command: "bin/run-ricom {ref_time}",
    },
    TaskClass {
        name: "mos",
        valid_hours: &[0, 6, 12, 18],
        variant: Variant::Standard,
        prerequisites: mos_prerequisites,
        postrequisites: mos_postrequisites,
        command: "bin/run-mos {ref_time}",
    },
    TaskClass {
        name: "nztide",
        valid_hours: &[6, 18],
        variant: Variant::RunaheadLimited {
            max_finished: MAX_FINISHED,
        },
        prerequisites: no_prerequisites,
        postrequisites: nztide_postrequisites,
        command: "bin/run-nztide {ref_time}",
    },
    TaskClass {
        name: "topnet",
        valid_hours: &ALL_HOURS,
        variant: Variant::FuzzyConsumer,
        prerequisites: topnet_prerequisites,
        postrequisites: topnet_postrequisites,
        command: "bin/run-topnet {ref_time}",
    },
    TaskClass {
        name: "nwpglobal",
        valid_hours: &[0],
        variant: Variant::Standard,
        prerequisites: nwpglobal_prerequisites,
        postrequisites: nwpglobal_postrequisites,
        command: "bin/run-nwpglobal {ref_time}",
    },
];

// ---------------------------------------------------------------------------
// Requisite templates
// ---------------------------------------------------------------------------

fn no_prerequisites(_rt: RefTime, _ctx: &TemplateContext) -> RequisiteSet {
    RequisiteSet::exact("source", Vec::<String>::new())
}

fn downloader_postrequisites(rt: RefTime) -> RequisiteSet {
    let lbc_06 = rt.decrement(6);
    let lbc_12 = rt.decrement(12);
    match rt.hour() {
        0 => RequisiteSet::timed(
            "downloader",
            [
                (0.0, format!("downloader started for {}", rt)),
                (0.5, format!("file obstore_{}.um ready", rt)),
                (1.0, format!("file bgerr{}.um ready", rt)),
                (106.0, format!("file lbc_{}.um ready", lbc_12)),
                (122.0, format!("file 10mwind_{}.um ready", rt)),
                (122.5, format!("file seaice_{}.um ready", rt)),
                (199.0, format!("file dump_{}.um ready", rt)),
                (200.0, format!("downloader finished for {}", rt)),
            ],
        ),
        12 => RequisiteSet::timed(
            "downloader",
            [
                (0.0, format!("downloader started for {}", rt)),
                (0.5, format!("file obstore_{}.um ready", rt)),
                (1.0, format!("file bgerr{}.um ready", rt)),
                (97.0, format!("file lbc_{}.um ready", lbc_12)),
                (98.0, format!("downloader finished for {}", rt)),
            ],
        ),
        // 06 and 18
        _ => RequisiteSet::timed(
            "downloader",
            [
                (0.0, format!("downloader started for {}", rt)),
                (0.0, format!("file lbc_{}.um ready", lbc_06)),
                (0.5, format!("file obstore_{}.um ready", rt)),
                (1.0, format!("file bgerr{}.um ready", rt)),
                (2.0, format!("downloader finished for {}", rt)),
            ],
        ),
    }
}

fn oper_to_topnet_postrequisites(rt: RefTime) -> RequisiteSet {
    RequisiteSet::timed(
        "oper_to_topnet",
        [
            (0.0, format!("oper_to_topnet started for {}", rt)),
            (1.0, format!("file tn_{}.nc ready", rt)),
            (2.0, format!("oper_to_topnet finished for {}", rt)),
        ],
    )
}

fn nzlam_prerequisites(rt: RefTime, _ctx: &TemplateContext) -> RequisiteSet {
    let lbc = match rt.hour() {
        0 | 12 => rt.decrement(12),
        _ => rt.decrement(6),
    };
    RequisiteSet::exact(
        "nzlam",
        [
            format!("file obstore_{}.um ready", rt),
            format!("file bgerr{}.um ready", rt),
            format!("file lbc_{}.um ready", lbc),
        ],
    )
}

fn nzlam_postrequisites(rt: RefTime) -> RequisiteSet {
    match rt.hour() {
        0 | 12 => RequisiteSet::timed(
            "nzlam",
            [
                (0.0, format!("nzlam started for {}", rt)),
                (30.0, format!("file sls_{}.um ready", rt)),
                (32.0, format!("nzlam finished for {}", rt)),
            ],
        ),
        _ => RequisiteSet::timed(
            "nzlam",
            [
                (0.0, format!("nzlam started for {}", rt)),
                (110.0, format!("file tn_{}.um ready", rt)),
                (111.0, format!("file sls_{}.um ready", rt)),
                (112.0, format!("file met_{}.um ready", rt)),
                (115.0, format!("nzlam finished for {}", rt)),
            ],
        ),
    }
}

fn nzlam_post_prerequisites(rt: RefTime, _ctx: &TemplateContext) -> RequisiteSet {
    match rt.hour() {
        0 | 12 => RequisiteSet::exact("nzlam_post", [format!("file sls_{}.um ready", rt)]),
        _ => RequisiteSet::exact(
            "nzlam_post",
            [
                format!("file tn_{}.um ready", rt),
                format!("file sls_{}.um ready", rt),
                format!("file met_{}.um ready", rt),
            ],
        ),
    }
}

fn nzlam_post_postrequisites(rt: RefTime) -> RequisiteSet {
    match rt.hour() {
        0 | 12 => RequisiteSet::timed(
            "nzlam_post",
            [
                (0.0, format!("nzlam_post started for {}", rt)),
                (10.0, format!("file sls_{}.nc ready", rt)),
                (11.0, format!("nzlam_post finished for {}", rt)),
            ],
        ),
        _ => RequisiteSet::timed(
            "nzlam_post",
            [
                (0.0, format!("nzlam_post started for {}", rt)),
                (10.0, format!("file sls_{}.nc ready", rt)),
                (20.0, format!("file tn_{}.nc ready", rt)),
                (30.0, format!("file met_{}.nc ready", rt)),
                (31.0, format!("nzlam_post finished for {}", rt)),
            ],
        ),
    }
}

fn globalprep_prerequisites(rt: RefTime, _ctx: &TemplateContext) -> RequisiteSet {
    RequisiteSet::exact(
        "globalprep",
        [
            format!("file 10mwind_{}.um ready", rt),
            format!("file seaice_{}.um ready", rt),
        ],
    )
}

fn globalprep_postrequisites(rt: RefTime) -> RequisiteSet {
    RequisiteSet::timed(
        "globalprep",
        [
            (0.0, format!("globalprep started for {}", rt)),
            (5.0, format!("file 10mwind_{}.nc ready", rt)),
            (7.0, format!("file seaice_{}.nc ready", rt)),
            (10.0, format!("globalprep finished for {}", rt)),
        ],
    )
}

fn globalwave_prerequisites(rt: RefTime, _ctx: &TemplateContext) -> RequisiteSet {
    RequisiteSet::exact(
        "globalwave",
        [
            format!("file 10mwind_{}.nc ready", rt),
            format!("file seaice_{}.nc ready", rt),
        ],
    )
}

fn globalwave_postrequisites(rt: RefTime) -> RequisiteSet {
    RequisiteSet::timed(
        "globalwave",
        [
            (0.0, format!("globalwave started for {}", rt)),
            (120.0, format!("file globalwave_{}.nc ready", rt)),
            (121.0, format!("globalwave finished for {}", rt)),
        ],
    )
}

fn nzwave_prerequisites(rt: RefTime, _ctx: &TemplateContext) -> RequisiteSet {
    RequisiteSet::exact("nzwave", [format!("file sls_{}.nc ready", rt)])
}

fn nzwave_postrequisites(rt: RefTime) -> RequisiteSet {
    RequisiteSet::timed(
        "nzwave",
        [
            (0.0, format!("nzwave started for {}", rt)),
            (110.0, format!("file nzwave_{}.nc ready", rt)),
            (112.0, format!("nzwave finished for {}", rt)),
        ],
    )
}

fn ricom_prerequisites(rt: RefTime, _ctx: &TemplateContext) -> RequisiteSet {
    RequisiteSet::exact("ricom", [format!("file sls_{}.nc ready", rt)])
}

fn ricom_postrequisites(rt: RefTime) -> RequisiteSet {
    RequisiteSet::timed(
        "ricom",
        [
            (0.0, format!("ricom started for {}", rt)),
            (30.0, format!("file ricom_{}.nc ready", rt)),
            (31.0, format!("ricom finished for {}", rt)),
        ],
    )
}

fn mos_prerequisites(rt: RefTime, _ctx: &TemplateContext) -> RequisiteSet {
    match rt.hour() {
        6 | 18 => RequisiteSet::exact("mos", [format!("file met_{}.nc ready", rt)]),
        _ => RequisiteSet::exact("mos", Vec::<String>::new()),
    }
}

fn mos_postrequisites(rt: RefTime) -> RequisiteSet {
    RequisiteSet::timed(
        "mos",
        [
            (0.0, format!("mos started for {}", rt)),
            (5.0, format!("file mos_{}.nc ready", rt)),
            (6.0, format!("mos finished for {}", rt)),
        ],
    )
}

fn nztide_postrequisites(rt: RefTime) -> RequisiteSet {
    RequisiteSet::timed(
        "nztide",
        [
            (0.0, format!("nztide started for {}", rt)),
            (1.0, format!("file nztide_{}.nc ready", rt)),
            (2.0, format!("nztide finished for {}", rt)),
        ],
    )
}

fn topnet_prerequisites(rt: RefTime, ctx: &TemplateContext) -> RequisiteSet {
    // accept any upstream nzlam artifact inside the cutoff window, newest
    // preferred via fuzzy sharpening
    let cutoff = if ctx.catchup_mode { 11 } else { 23 };
    RequisiteSet::fuzzy(
        "topnet",
        [format!(
            "file tn_<{}..{}>.nc ready",
            rt.decrement(cutoff),
            rt.decrement(1)
        )],
    )
}

fn topnet_postrequisites(rt: RefTime) -> RequisiteSet {
    RequisiteSet::timed(
        "topnet",
        [
            (0.0, format!("streamflow extraction started for {}", rt)),
            (2.0, format!("got streamflow data for {}", rt)),
            (2.1, format!("streamflow extraction finished for {}", rt)),
            (3.0, format!("topnet started for {}", rt)),
            (4.0, format!("file topnet_{}.nc ready", rt)),
            (5.0, format!("topnet finished for {}", rt)),
        ],
    )
}

fn nwpglobal_prerequisites(rt: RefTime, _ctx: &TemplateContext) -> RequisiteSet {
    RequisiteSet::exact("nwpglobal", [format!("file 10mwind_{}.um ready", rt)])
}

fn nwpglobal_postrequisites(rt: RefTime) -> RequisiteSet {
    RequisiteSet::timed(
        "nwpglobal",
        [
            (0.0, format!("nwpglobal started for {}", rt)),
            (120.0, format!("file 10mwind_{}.nc ready", rt)),
            (121.0, format!("nwpglobal finished for {}", rt)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rt(s: &str) -> RefTime {
        s.parse().expect("valid stamp")
    }

    #[test]
    fn test_lookup_known_classes() {
        for name in [
            "downloader",
            "oper_to_topnet",
            "nzlam",
            "nzlam_post",
            "globalprep",
            "globalwave",
            "nzwave",
            "ricom",
            "mos",
            "nztide",
            "topnet",
            "nwpglobal",
        ] {
            let class = lookup(name).expect("class registered");
            assert_eq!(class.name, name);
            assert!(!class.valid_hours.is_empty());
        }
    }

    #[test]
    fn test_lookup_unknown_class_fails() {
        match lookup("frobnicator") {
            Err(SchedulerError::UnknownClass(name)) => assert_eq!(name, "frobnicator"),
            other => panic!("Expected UnknownClass, got: {:?}", other),
        }
    }

    #[test]
    fn test_valid_hours_are_sorted() {
        for class in CLASSES {
            let mut sorted = class.valid_hours.to_vec();
            sorted.sort_unstable();
            assert_eq!(sorted.as_slice(), class.valid_hours, "{}", class.name);
        }
    }

    #[test]
    fn test_every_class_produces_postrequisites() {
        let ctx = TemplateContext::default();
        for class in CLASSES {
            let t = rt("2011010100").nearest(class.valid_hours);
            let post = (class.postrequisites)(t);
            assert!(!post.is_empty(), "{} has no postrequisites", class.name);
            assert!(!post.all_satisfied(), "{} template pre-satisfied", class.name);
            let _ = (class.prerequisites)(t, &ctx);
        }
    }

    #[test]
    fn test_downloader_templates_differ_by_hour() {
        let post_00 = downloader_postrequisites(rt("2011010100"));
        let post_06 = downloader_postrequisites(rt("2011010106"));
        let post_12 = downloader_postrequisites(rt("2011010112"));
        assert_eq!(post_00.len(), 8);
        assert_eq!(post_06.len(), 5);
        assert_eq!(post_12.len(), 5);
        // the 00 cycle carries the 12-hour-old boundary condition file
        assert!(post_00.exists("file lbc_2010123112.um ready"));
        // the 06 cycle carries the 6-hour-old one
        assert!(post_06.exists("file lbc_2011010100.um ready"));
    }

    #[test]
    fn test_nzlam_prerequisites_follow_cycle_hour() {
        let ctx = TemplateContext::default();
        let pre_00 = nzlam_prerequisites(rt("2011010100"), &ctx);
        assert!(pre_00.exists("file obstore_2011010100.um ready"));
        assert!(pre_00.exists("file bgerr2011010100.um ready"));
        assert!(pre_00.exists("file lbc_2010123112.um ready"));

        let pre_06 = nzlam_prerequisites(rt("2011010106"), &ctx);
        assert!(pre_06.exists("file lbc_2011010100.um ready"));
    }

    #[test]
    fn test_mos_prerequisites_empty_at_synoptic_hours() {
        let ctx = TemplateContext::default();
        assert!(mos_prerequisites(rt("2011010100"), &ctx).is_empty());
        assert!(mos_prerequisites(rt("2011010112"), &ctx).is_empty());
        assert!(!mos_prerequisites(rt("2011010106"), &ctx).is_empty());
    }

    #[test]
    fn test_topnet_cutoff_depends_on_catchup_mode() {
        let catchup = TemplateContext { catchup_mode: true };
        let uptodate = TemplateContext {
            catchup_mode: false,
        };
        let pre = topnet_prerequisites(rt("2011010100"), &catchup);
        assert_eq!(
            pre.list(),
            vec!["file tn_<2010123113..2010123123>.nc ready".to_string()]
        );
        let pre = topnet_prerequisites(rt("2011010100"), &uptodate);
        assert_eq!(
            pre.list(),
            vec!["file tn_<2010123101..2010123123>.nc ready".to_string()]
        );
    }

    #[test]
    fn test_topnet_runs_every_hour() {
        let class = lookup("topnet").unwrap();
        assert_eq!(class.valid_hours.len(), 24);
        assert_eq!(rt("2011010113").nearest(class.valid_hours), rt("2011010113"));
    }
}
