//! Satellite polynomial.

use crate::indication::SvPolynomialInd;
use crate::report::{PolyValid, SvPolynomial};

/// Copy as many leading values as fit into the fixed-size array.
fn copy_into<T: Copy>(dst: &mut [T], src: &[T]) {
    let n = dst.len().min(src.len());
    dst[..n].copy_from_slice(&src[..n]);
}

/// Convert a polynomial indication. Returns `None` for satellite id 0.
pub fn sv_polynomial(ind: &SvPolynomialInd) -> Option<SvPolynomial> {
    if ind.gnss_sv_id == 0 {
        return None;
    }
    let mut poly = SvPolynomial {
        is_valid: PolyValid::T0,
        gnss_sv_id: ind.gnss_sv_id,
        t0: ind.t0,
        sv_poly_flags: ind.sv_poly_flags.bits(),
        ..Default::default()
    };

    if let Some(freq) = ind.glo_frequency {
        poly.is_valid |= PolyValid::GLO_FREQ;
        poly.freq_num = freq;
    }
    if let Some(iode) = ind.iode {
        poly.is_valid |= PolyValid::IODE;
        poly.iode = iode;
    }
    if let Some(iod) = ind.enhanced_iod {
        poly.is_valid |= PolyValid::ENHANCED_IOD;
        poly.enhanced_iod = iod;
    }
    if let Some(unc) = ind.pos_unc {
        poly.is_valid |= PolyValid::SV_POSUNC;
        poly.sv_pos_unc = unc;
    }
    if let Some(flag) = ind.flag {
        poly.is_valid |= PolyValid::FLAG;
        poly.poly_flags = flag;
    }
    if let Some(c) = &ind.polynomial_coefficient_xyz0 {
        poly.is_valid |= PolyValid::POLYCOEFF_XYZ0;
        copy_into(&mut poly.polynomial_coeff_xyz0, c);
    }
    if let Some(c) = &ind.polynomial_coefficient_xyzn {
        poly.is_valid |= PolyValid::POLYCOEFF_XYZN;
        copy_into(&mut poly.polynomial_coeff_xyzn, c);
    }
    if let Some(c) = &ind.polynomial_coefficient_other {
        poly.is_valid |= PolyValid::POLYCOEFF_OTHER;
        copy_into(&mut poly.polynomial_coeff_other, c);
    }
    if let Some(c) = &ind.velocity_coefficient {
        poly.is_valid |= PolyValid::VELO_COEFF;
        copy_into(&mut poly.velocity_coeff, c);
    }

    let scalars = [
        (ind.iono_delay, PolyValid::IONODELAY, &mut poly.iono_delay),
        (ind.iono_dot, PolyValid::IONODOT, &mut poly.iono_dot),
        (ind.sbas_iono_delay, PolyValid::SBAS_IONODELAY, &mut poly.sbas_iono_delay),
        (ind.sbas_iono_dot, PolyValid::SBAS_IONODOT, &mut poly.sbas_iono_dot),
        (ind.tropo_delay, PolyValid::TROPODELAY, &mut poly.tropo_delay),
        (ind.elevation, PolyValid::ELEVATION, &mut poly.elevation),
        (ind.elevation_dot, PolyValid::ELEVATIONDOT, &mut poly.elevation_dot),
        (ind.elevation_unc, PolyValid::ELEVATIONUNC, &mut poly.elevation_unc),
    ];
    let mut valid = PolyValid::empty();
    for (value, bit, slot) in scalars {
        if let Some(v) = value {
            *slot = v;
            valid |= bit;
        }
    }
    poly.is_valid |= valid;

    Some(poly)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indication::SvPolyFlags;

    #[test]
    fn zero_id_is_skipped() {
        assert!(sv_polynomial(&SvPolynomialInd::new(0, 1.0)).is_none());
    }

    #[test]
    fn only_present_fields_are_valid() {
        let mut ind = SvPolynomialInd::new(65, 12.5);
        ind.sv_poly_flags = SvPolyFlags::GNSS_SV_POLY_GLO_STR4;
        ind.glo_frequency = Some(3);
        ind.tropo_delay = Some(2.5);
        let poly = sv_polynomial(&ind).unwrap();
        assert_eq!(
            poly.is_valid,
            PolyValid::T0 | PolyValid::GLO_FREQ | PolyValid::TROPODELAY
        );
        assert_eq!(poly.freq_num, 3);
        assert_eq!(poly.tropo_delay, 2.5);
        assert_eq!(poly.sv_poly_flags, SvPolyFlags::GNSS_SV_POLY_GLO_STR4.bits());
        assert_eq!(poly.iono_delay, 0.0);
    }

    #[test]
    fn coefficient_arrays_are_clamped() {
        let mut ind = SvPolynomialInd::new(3, 0.0);
        ind.polynomial_coefficient_xyz0 = Some(vec![1.0; 10]);
        ind.polynomial_coefficient_other = Some(vec![2.0, 3.0]);
        let poly = sv_polynomial(&ind).unwrap();
        assert_eq!(poly.polynomial_coeff_xyz0, [1.0; 4]);
        assert_eq!(poly.polynomial_coeff_other, [2.0, 3.0, 0.0, 0.0]);
        assert!(poly
            .is_valid
            .contains(PolyValid::POLYCOEFF_XYZ0 | PolyValid::POLYCOEFF_OTHER));
    }
}
