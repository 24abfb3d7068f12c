//! Capture row schema.
//!
//! Downstream analysis keys on column position, so the column order in
//! [`HEADER`] and [`format_line`] must only ever change together with
//! [`SCHEMA_VERSION`].

use std::fmt::Write;

use crate::device::{Quat, Vec3};

pub const SCHEMA_VERSION: u32 = 1;

pub const HEADER: &str = "system_time_ns,unity_realtime_s,\
pos_mm_x,pos_mm_y,pos_mm_z,\
rot_q_x,rot_q_y,rot_q_z,rot_q_w,\
joint_rad_0,joint_rad_1,joint_rad_2,\
gimbal_rad_0,gimbal_rad_1,gimbal_rad_2,\
force_N_x,force_N_y,force_N_z,\
is_holding,held_ring_id,event_code,\
fps,dt_frame_s";

pub const FIELD_COUNT: usize = 23;

/// Held id written when nothing is held.
pub const NO_RING: i32 = -1;

/// Discrete task events. Posted by game logic, consumed by at most one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum EventCode {
    #[default]
    None = 0,
    GrabBegin = 1,
    GrabEnd = 2,
    RingContactBegin = 3,
    RingContactEnd = 4,
    PegPlace = 5,
    PegDrop = 6,
    Other = 99,
}

impl EventCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => EventCode::None,
            1 => EventCode::GrabBegin,
            2 => EventCode::GrabEnd,
            3 => EventCode::RingContactBegin,
            4 => EventCode::RingContactEnd,
            5 => EventCode::PegPlace,
            6 => EventCode::PegDrop,
            _ => EventCode::Other,
        }
    }
}

/// One tick's observation of one device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRecord {
    pub system_time_ns: u64,
    pub realtime_s: f64,
    pub position_mm: Vec3,
    pub rotation: Quat,
    pub joint_rad: Vec3,
    pub gimbal_rad: Vec3,
    pub force_n: Vec3,
    pub is_holding: bool,
    pub held_ring_id: i32,
    pub event: EventCode,
    pub fps: f32,
    pub dt_s: f64,
}

/// Renders a record as one CSV row, without the trailing newline.
///
/// Floats use Rust's shortest representation that parses back to the same
/// value; integers are plain decimal.
pub fn format_line(record: &SampleRecord) -> String {
    let mut line = String::with_capacity(320);
    // Writing into a String cannot fail
    let _ = write_line(&mut line, record);
    line
}

fn write_line(out: &mut String, r: &SampleRecord) -> std::fmt::Result {
    write!(out, "{},{},", r.system_time_ns, r.realtime_s)?;
    write_vec3(out, r.position_mm)?;
    write!(out, "{},{},{},{},", r.rotation.x, r.rotation.y, r.rotation.z, r.rotation.w)?;
    write_vec3(out, r.joint_rad)?;
    write_vec3(out, r.gimbal_rad)?;
    write_vec3(out, r.force_n)?;
    write!(
        out,
        "{},{},{},{},{}",
        u8::from(r.is_holding),
        r.held_ring_id,
        r.event.code(),
        r.fps,
        r.dt_s
    )
}

fn write_vec3(out: &mut String, v: Vec3) -> std::fmt::Result {
    write!(out, "{},{},{},", v.x, v.y, v.z)
}
