// DC motor physics for the simulated IO layers
//
// Each mechanism is modelled as a geared motor spinning a pure inertia:
//   dv/dt = a * v + b * u
// The system is first order in velocity, so it is stepped with its exact
// discretization. Explicit Euler goes unstable for the light steering
// inertia at a 20 ms period.

/// Battery-referenced motor constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcMotor {
    pub nominal_voltage: f64,
    pub stall_torque_nm: f64,
    pub stall_current_amps: f64,
    pub free_current_amps: f64,
    pub free_speed_rad_per_sec: f64,
}

impl DcMotor {
    /// REV NEO brushless, `count` motors geared together
    pub fn neo(count: usize) -> Self {
        let count = count as f64;
        Self {
            nominal_voltage: 12.0,
            stall_torque_nm: 2.6 * count,
            stall_current_amps: 105.0 * count,
            free_current_amps: 1.8 * count,
            free_speed_rad_per_sec: 5676.0 * std::f64::consts::TAU / 60.0,
        }
    }

    pub fn resistance_ohms(&self) -> f64 {
        self.nominal_voltage / self.stall_current_amps
    }

    /// Speed constant, rad/s per volt
    pub fn kv(&self) -> f64 {
        self.free_speed_rad_per_sec
            / (self.nominal_voltage - self.resistance_ohms() * self.free_current_amps)
    }

    /// Torque constant, Nm per amp
    pub fn kt(&self) -> f64 {
        self.stall_torque_nm / self.stall_current_amps
    }

    pub fn current_amps(&self, speed_rad_per_sec: f64, voltage: f64) -> f64 {
        (voltage - speed_rad_per_sec / self.kv()) / self.resistance_ohms()
    }
}

/// A geared motor driving an inertia, tracked at the output shaft
#[derive(Debug, Clone)]
pub struct DcMotorSim {
    motor: DcMotor,
    gearing: f64,
    a: f64,
    b: f64,
    position_rad: f64,
    velocity_rad_per_sec: f64,
    input_volts: f64,
}

impl DcMotorSim {
    /// `gearing` is motor turns per output turn, `moi` in kg m^2
    pub fn new(motor: DcMotor, gearing: f64, moi: f64) -> Self {
        let r = motor.resistance_ohms();
        let a = -gearing * gearing * motor.kt() / (motor.kv() * r * moi);
        let b = gearing * motor.kt() / (r * moi);
        Self {
            motor,
            gearing,
            a,
            b,
            position_rad: 0.0,
            velocity_rad_per_sec: 0.0,
            input_volts: 0.0,
        }
    }

    pub fn set_input_voltage(&mut self, volts: f64) {
        self.input_volts = volts;
    }

    pub fn update(&mut self, dt: f64) {
        let decay = (self.a * dt).exp();
        let steady_state = -self.b * self.input_volts / self.a;
        let v0 = self.velocity_rad_per_sec;

        self.velocity_rad_per_sec = steady_state + (v0 - steady_state) * decay;
        self.position_rad += steady_state * dt + (v0 - steady_state) * (decay - 1.0) / self.a;
    }

    pub fn position_rad(&self) -> f64 {
        self.position_rad
    }

    pub fn velocity_rad_per_sec(&self) -> f64 {
        self.velocity_rad_per_sec
    }

    pub fn set_state(&mut self, position_rad: f64, velocity_rad_per_sec: f64) {
        self.position_rad = position_rad;
        self.velocity_rad_per_sec = velocity_rad_per_sec;
    }

    pub fn current_draw_amps(&self) -> f64 {
        let motor_speed = self.velocity_rad_per_sec * self.gearing;
        self.motor.current_amps(motor_speed, self.input_volts).abs()
    }
}
