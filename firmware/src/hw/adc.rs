//! ADC1 sampling PA0 on every TIM3 trigger.
//!
//! Embassy brings the converter up (regulator, calibration, enable). The
//! trigger and DMA bits it does not expose are set directly on the PAC.

#![cfg(target_os = "none")]

use embassy_stm32::Peri;
use embassy_stm32::adc::{Adc, Resolution, SampleTime};
use embassy_stm32::gpio::Flex;
use embassy_stm32::pac;
use embassy_stm32::peripherals::{ADC1, PA0};
use monitor_core::config::{ADC_RESOLUTION_BITS, ConverterConfig};
use monitor_core::hal::{Converter, HardwareFault};

/// ADC input channel wired to PA0.
const PA0_CHANNEL: u8 = 0;

/// Register polls before a ready flag is considered stuck.
const READY_SPINS: u32 = 10_000;

pub struct Adc1Converter {
    _adc: Adc<'static, ADC1>,
    _input: Flex<'static>,
    converting: bool,
}

impl Adc1Converter {
    pub fn new(adc: Peri<'static, ADC1>, pin: Peri<'static, PA0>) -> Self {
        let mut adc = Adc::new(adc);
        adc.set_sample_time(SampleTime::CYCLES160_5);
        adc.set_resolution(Resolution::BITS12);

        let mut input = Flex::new(pin);
        input.set_as_analog();

        Self {
            _adc: adc,
            _input: input,
            converting: false,
        }
    }
}

impl Converter for Adc1Converter {
    fn configure(&mut self, config: &ConverterConfig) -> Result<(), HardwareFault> {
        if config.channel != PA0_CHANNEL || config.resolution_bits != ADC_RESOLUTION_BITS {
            return Err(HardwareFault::Unsupported);
        }

        let adc = pac::ADC1;
        adc.cfgr1().modify(|w| {
            w.set_cont(false);
            w.set_ovrmod(pac::adc::vals::Ovrmod::OVERWRITE);
            w.set_dmacfg(pac::adc::vals::Dmacfg::ONE_SHOT);
            w.set_dmaen(config.transfer_on_result);
        });

        adc.isr().write(|w| w.set_ccrdy(true));
        adc.chselr()
            .write(|w| w.set_chsel(usize::from(config.channel), true));
        wait_for(|| adc.isr().read().ccrdy())?;

        self.converting = false;
        Ok(())
    }

    fn start(&mut self) {
        let adc = pac::ADC1;
        adc.isr().write(|w| {
            w.set_eoc(true);
            w.set_ovr(true);
        });
        adc.cr().modify(|w| w.set_adstart(true));
        self.converting = true;
    }

    fn stop(&mut self) {
        let adc = pac::ADC1;
        if adc.cr().read().adstart() {
            adc.cr().modify(|w| w.set_adstp(true));
            // A stuck ADSTP leaves ADSTART set; the next start re-issues it.
            let _ = wait_for(|| !adc.cr().read().adstart());
        }
        self.converting = false;
    }

    fn is_converting(&self) -> bool {
        self.converting
    }
}

fn wait_for(mut ready: impl FnMut() -> bool) -> Result<(), HardwareFault> {
    for _ in 0..READY_SPINS {
        if ready() {
            return Ok(());
        }
    }
    Err(HardwareFault::NotReady)
}
