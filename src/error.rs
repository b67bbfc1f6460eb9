use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("sensor error: {0}")]
    Sensor(String),
    #[error("pwm error: {0}")]
    Pwm(String),
    #[error("controller lock poisoned")]
    StateLock,
}
