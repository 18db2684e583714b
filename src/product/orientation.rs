//! Attitude and heading from accelerometer and magnetometer vectors.
//! Angles are returned in radians unless stated otherwise.

/// Roll, pitch and yaw angles
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Attitude {
    /// Tilt compensated attitude from one accelerometer and one
    /// magnetometer vector
    pub fn new(accel: [f64; 3], mag: [f64; 3]) -> Self {
        let [ax, ay, az] = accel;
        let [mx, my, mz] = mag;

        let roll = ay.atan2(az);
        let (sin_r, cos_r) = roll.sin_cos();
        let pitch = (-ax).atan2(ay * sin_r + az * cos_r);
        let (sin_p, cos_p) = pitch.sin_cos();

        let by = mz * sin_r - my * cos_r;
        let bx = mx * cos_p + my * sin_p * sin_r + mz * sin_p * cos_r;

        Self {
            roll,
            pitch,
            yaw: by.atan2(bx),
        }
    }

    /// Current heading (rad): yaw corrected by the direction of tilt
    pub fn current_heading(&self) -> f64 {
        let (sin_r, cos_r) = self.roll.sin_cos();
        (-cos_r * self.pitch.sin()).atan2(sin_r) + self.yaw
    }
}

/// Applies magnetic `declination` (°) to `heading` (°), result in [-180, 180[
pub fn signed_heading(heading: f64, declination: f64) -> f64 {
    (heading + 180.0 + declination).rem_euclid(360.0) - 180.0
}

/// Applies magnetic `declination` (°) to `heading` (°), result in [0, 360[
pub fn positive_heading(heading: f64, declination: f64) -> f64 {
    (heading + declination).rem_euclid(360.0)
}

/// Angle (°) between the accelerometer Z axis and the vertical,
/// folded into [0, 90]
pub fn tilt(accel: [f64; 3]) -> f64 {
    let [ax, ay, az] = accel;
    let norm = (ax * ax + ay * ay + az * az).sqrt();
    let tilt = (az / norm).acos().to_degrees();
    if tilt > 90.0 {
        180.0 - tilt
    } else {
        tilt
    }
}

/// Cable attitude: returns (pitch, axial) angles
pub fn cable(accel: [f64; 3]) -> (f64, f64) {
    let [ax, ay, az] = accel;
    let axial = (-ax).atan2(ay);
    let pitch = az.atan2(-(ax * axial.sin() - ay * axial.cos()));
    (pitch, axial)
}
